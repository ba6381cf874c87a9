//! Transaction signing and submission.
//!
//! Every transaction goes through [`TxSubmitter::submit`], which holds a
//! per-signer lock from nonce read until the receipt is observed. One signer
//! therefore never has more than one transaction in flight from this process,
//! which keeps nonces gapless without a nonce cache. The core wallet signs
//! both gas top-ups and withdrawals, so this is what keeps those two paths
//! from racing each other.

use std::{sync::Arc, time::Duration};

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Address, Bytes, TxKind, U256},
    signers::local::PrivateKeySigner,
};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    config::Intervals,
    error::LedgerError,
    ledger::{CallRequest, Ledger},
    types::Receipt,
};

/// How the gas limit of a transaction is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasLimit {
    Fixed(u64),
    /// Node estimate plus the given margin, in percent.
    Estimate { margin_percent: u64 },
}

/// Unsigned transaction to submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: GasLimit,
}

pub struct TxSubmitter<L> {
    ledger: Arc<L>,
    chain_id: u64,
    receipt_poll: Duration,
    receipt_timeout: Duration,
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl<L: Ledger> TxSubmitter<L> {
    pub fn new(ledger: Arc<L>, chain_id: u64, intervals: &Intervals) -> Self {
        Self {
            ledger,
            chain_id,
            receipt_poll: intervals.receipt_poll,
            receipt_timeout: intervals.receipt_timeout,
            locks: DashMap::new(),
        }
    }

    fn lock(&self, signer: Address) -> Arc<Mutex<()>> {
        self.locks.entry(signer).or_default().value().clone()
    }

    /// Signs the request with a fresh nonce, submits it and waits for the
    /// receipt.
    ///
    /// Reverted transactions are returned as receipts with `success == false`.
    pub async fn submit(
        &self,
        signer: &PrivateKeySigner,
        request: TxRequest,
    ) -> Result<Receipt, LedgerError> {
        let from = signer.address();
        let lock = self.lock(from);
        let _guard = lock.lock().await;

        let (nonce, gas_price) =
            futures::try_join!(self.ledger.transaction_count(from), self.ledger.gas_price())?;

        let gas_limit = match request.gas_limit {
            GasLimit::Fixed(limit) => limit,
            GasLimit::Estimate { margin_percent } => {
                let estimate = self
                    .ledger
                    .estimate_gas(CallRequest {
                        from,
                        to: request.to,
                        value: request.value,
                        input: request.input.clone(),
                    })
                    .await?;
                estimate.saturating_mul(100 + margin_percent) / 100
            },
        };

        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(request.to),
            value: request.value,
            input: request.input,
        };
        let signature = TxSignerSync::sign_transaction_sync(signer, &mut tx)
            .map_err(|err| LedgerError::Signing(err.to_string()))?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();

        let tx_hash = self
            .ledger
            .send_raw_transaction(envelope.encoded_2718().into())
            .await?;
        tracing::debug!(%from, %tx_hash, nonce, gas_limit, gas_price, "transaction submitted");

        self.wait_for_receipt(tx_hash).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: alloy::primitives::TxHash,
    ) -> Result<Receipt, LedgerError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.ledger.receipt(tx_hash).await? {
                    return Ok(receipt);
                }
                tokio::time::sleep(self.receipt_poll).await;
            }
        };
        tokio::time::timeout(self.receipt_timeout, poll)
            .await
            .map_err(|_| LedgerError::Timeout(tx_hash))?
    }
}
