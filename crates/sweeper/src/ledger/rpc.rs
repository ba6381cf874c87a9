use alloy::{
    eips::BlockNumberOrTag,
    network::{TransactionBuilder, TransactionResponse},
    primitives::{Address, Bytes, TxHash, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
};

use super::{CallRequest, Ledger};
use crate::{
    abi::IERC20,
    error::LedgerError,
    types::{LedgerBlock, LedgerTransaction, Receipt},
};

/// [`Ledger`] over JSON-RPC.
///
/// It is recommended to setup provider with
/// [`alloy::transports::layers::RetryBackoffLayer`]; errors surviving the
/// retries are classified by [`LedgerError::from`].
#[derive(Clone, Debug)]
pub struct RpcLedger<P> {
    provider: P,
}

impl<P: Provider> RpcLedger<P> {
    pub fn new(provider: P) -> Self { Self { provider } }

    pub fn provider(&self) -> &P { &self.provider }
}

impl<P: Provider> Ledger for RpcLedger<P> {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block(&self, number: u64) -> Result<Option<LedgerBlock>, LedgerError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await?;
        Ok(block.map(|block| LedgerBlock {
            number: block.header.number,
            timestamp: block.header.timestamp,
            transactions: block
                .transactions
                .into_transactions()
                .map(|tx| LedgerTransaction {
                    hash: TransactionResponse::tx_hash(&tx),
                    from: TransactionResponse::from(&tx),
                    to: alloy::consensus::Transaction::to(&tx),
                    input: alloy::consensus::Transaction::input(&tx).clone(),
                })
                .collect(),
        }))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, LedgerError> {
        Ok(IERC20::new(token, &self.provider)
            .balanceOf(holder)
            .call()
            .await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .pending()
            .await?)
    }

    async fn gas_price(&self) -> Result<u128, LedgerError> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn estimate_gas(&self, call: CallRequest) -> Result<u64, LedgerError> {
        let request = TransactionRequest::default()
            .with_from(call.from)
            .with_to(call.to)
            .with_value(call.value)
            .with_input(call.input);
        Ok(self.provider.estimate_gas(request).await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, LedgerError> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, LedgerError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| Receipt {
            tx_hash: r.transaction_hash,
            success: r.status(),
            gas_used: r.gas_used,
            effective_gas_price: r.effective_gas_price,
        }))
    }
}
