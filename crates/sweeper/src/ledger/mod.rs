//! Ledger (node RPC) client boundary.
//!
//! [`Ledger`] is the only way the sweeper talks to the chain. [`RpcLedger`]
//! implements it over any alloy [`alloy::providers::Provider`]; tests use
//! [`crate::testing::MockLedger`].
//!
//! None of the operations carry their own timeout, resilience is provided by
//! the callers' backoff loops.

mod rpc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
pub use rpc::RpcLedger;

use crate::{
    error::LedgerError,
    types::{LedgerBlock, Receipt},
};

/// Contract call to estimate gas for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

pub trait Ledger: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    /// Current chain head.
    fn block_number(&self) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    /// Block with full transaction bodies, `None` if the node doesn't have it.
    fn block(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<LedgerBlock>, LedgerError>> + Send;

    /// Native currency balance, in wei.
    fn native_balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, LedgerError>> + Send;

    /// Token balance as reported by the token contract, in raw units.
    fn token_balance(
        &self,
        token: Address,
        holder: Address,
    ) -> impl Future<Output = Result<U256, LedgerError>> + Send;

    /// Next nonce of the address, including pending transactions.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn gas_price(&self) -> impl Future<Output = Result<u128, LedgerError>> + Send;

    fn estimate_gas(
        &self,
        call: CallRequest,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn send_raw_transaction(
        &self,
        raw: Bytes,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Receipt of a mined transaction, `None` while pending.
    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>, LedgerError>> + Send;
}
