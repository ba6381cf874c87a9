use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::{Address, TxHash};
use dashmap::DashMap;
use fastnum::UD128;

use super::{DepositRepository, RecordOutcome, WalletRepository};
use crate::{
    error::RepositoryError,
    types::{self, CurrencyId, DepositRecord, SubWalletId, Wallet},
};

/// In-process wallet and deposit store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    wallets: DashMap<Address, Wallet>,
    ledger: Mutex<Ledger>,
}

#[derive(Debug, Default)]
struct Ledger {
    recorded: HashSet<(SubWalletId, TxHash)>,
    deposits: Vec<DepositRecord>,
    balances: HashMap<(SubWalletId, CurrencyId), UD128>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_wallets(wallets: impl IntoIterator<Item = Wallet>) -> Self {
        let store = Self::new();
        wallets.into_iter().for_each(|w| store.add_wallet(w));
        store
    }

    pub fn add_wallet(&self, wallet: Wallet) { self.wallets.insert(wallet.address, wallet); }

    pub fn remove_wallet(&self, address: Address) -> Option<Wallet> {
        self.wallets.remove(&address).map(|(_, w)| w)
    }

    /// All recorded deposits, in recording order.
    pub fn deposits(&self) -> Vec<DepositRecord> { self.ledger().deposits.clone() }

    /// Credited balance of the sub-wallet.
    pub fn balance(&self, sub_wallet_id: SubWalletId, currency_id: CurrencyId) -> UD128 {
        self.ledger()
            .balances
            .get(&(sub_wallet_id, currency_id))
            .copied()
            .unwrap_or(UD128::ZERO)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        // A panic while holding the lock can't leave the ledger half-updated,
        // every mutation below is a single insert/push sequence.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WalletRepository for MemoryStore {
    async fn list_watched_addresses(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.wallets.iter().map(|e| types::normalized(e.key())).collect())
    }

    async fn find_wallet_by_address(
        &self,
        address: Address,
    ) -> Result<Option<Wallet>, RepositoryError> {
        Ok(self.wallets.get(&address).map(|e| e.value().clone()))
    }
}

impl DepositRepository for MemoryStore {
    async fn record_deposit(&self, record: &DepositRecord) -> Result<RecordOutcome, RepositoryError> {
        if !self.wallets.iter().any(|e| e.value().id == record.sub_wallet_id) {
            return Err(RepositoryError::UnknownWallet(record.sub_wallet_id));
        }
        let mut ledger = self.ledger();
        if !ledger.recorded.insert((record.sub_wallet_id, record.tx_hash)) {
            return Ok(RecordOutcome::Duplicate);
        }
        let balance = ledger
            .balances
            .entry((record.sub_wallet_id, record.currency_id))
            .or_insert(UD128::ZERO);
        *balance = *balance + record.amount - record.fee;
        ledger.deposits.push(record.clone());
        Ok(RecordOutcome::Recorded)
    }
}
