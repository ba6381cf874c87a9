//! Storage boundary.
//!
//! Durable state is owned by an external store; the sweeper only needs the
//! two narrow views below. [`MemoryStore`] implements both for tests and
//! local runs.

mod memory;

use alloy::primitives::Address;
pub use memory::MemoryStore;

use crate::{
    error::RepositoryError,
    types::{DepositRecord, Wallet},
};

pub trait WalletRepository: Send + Sync {
    /// Addresses of all custodial sub-wallets, as stored (any letter case).
    fn list_watched_addresses(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    fn find_wallet_by_address(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Option<Wallet>, RepositoryError>> + Send;
}

/// Result of [`DepositRepository::record_deposit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Same `(sub_wallet_id, tx_hash)` was recorded before; nothing changed.
    Duplicate,
}

pub trait DepositRepository: Send + Sync {
    /// Credits the sub-wallet and stores the deposit record in one atomic
    /// unit.
    ///
    /// Must be idempotent on `(sub_wallet_id, tx_hash)`.
    fn record_deposit(
        &self,
        record: &DepositRecord,
    ) -> impl Future<Output = Result<RecordOutcome, RepositoryError>> + Send;
}
