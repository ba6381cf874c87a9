//! Set of custodial addresses the scanner watches.
//!
//! The set is rebuilt from the wallet repository on every refresh and
//! published as a whole, so readers always see one complete set or the
//! previous one, never a partial merge.

use std::{
    collections::HashSet,
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{error::RepositoryError, repository::WalletRepository, types};

pub type AddressSet = Arc<HashSet<Address>>;

/// Refresh statistics, for operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryHealth {
    /// Refreshes failed since the last successful one.
    pub consecutive_failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Number of addresses in the current set.
    pub size: usize,
}

#[derive(Debug)]
pub struct AddressRegistry {
    addresses: watch::Sender<AddressSet>,
    consecutive_failures: AtomicU64,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for AddressRegistry {
    fn default() -> Self { Self::new() }
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self {
            addresses: watch::Sender::new(AddressSet::default()),
            consecutive_failures: AtomicU64::new(0),
            last_success_at: Mutex::new(None),
        }
    }

    /// Current set of watched addresses.
    pub fn snapshot(&self) -> AddressSet { self.addresses.borrow().clone() }

    pub fn contains(&self, address: &Address) -> bool { self.addresses.borrow().contains(address) }

    /// Receiver notified on every published set.
    pub fn subscribe(&self) -> watch::Receiver<AddressSet> { self.addresses.subscribe() }

    pub fn health(&self) -> RegistryHealth {
        RegistryHealth {
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_success_at: *self.last_success_at.lock().unwrap_or_else(|p| p.into_inner()),
            size: self.addresses.borrow().len(),
        }
    }

    /// Reloads the set from the repository and publishes it.
    ///
    /// Entries that don't parse as addresses are skipped. On repository
    /// failure the published set is left untouched.
    pub async fn refresh<W: WalletRepository + ?Sized>(
        &self,
        wallets: &W,
    ) -> Result<AddressSet, RepositoryError> {
        let listed = match wallets.list_watched_addresses().await {
            Ok(listed) => listed,
            Err(err) => {
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            },
        };

        let mut next = HashSet::with_capacity(listed.len());
        for entry in &listed {
            match Address::from_str(entry.trim()) {
                Ok(address) => {
                    next.insert(address);
                },
                Err(err) => {
                    tracing::warn!(entry = %entry, %err, "skipping malformed watched address")
                },
            }
        }

        let previous = self.snapshot();
        let added = next.difference(&previous).map(types::normalized).sorted().collect_vec();
        if !added.is_empty() {
            tracing::info!(
                count = added.len(),
                addresses = %added.join(","),
                "watching new addresses"
            );
        }
        let removed = previous.difference(&next).count();
        if removed > 0 {
            tracing::info!(count = removed, "stopped watching addresses");
        }

        let next = Arc::new(next);
        self.addresses.send_replace(next.clone());
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_success_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Utc::now());
        Ok(next)
    }

    /// Refreshes the set every `period` until cancelled.
    ///
    /// Failures are logged and the previous set stays in effect.
    pub async fn run<W, S, SFut>(
        &self,
        wallets: &W,
        period: Duration,
        cancel: CancellationToken,
        sleep: S,
    ) where
        W: WalletRepository + ?Sized,
        S: Fn(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        loop {
            if let Err(err) = self.refresh(wallets).await {
                tracing::warn!(
                    %err,
                    consecutive_failures = self.consecutive_failures.load(Ordering::Relaxed),
                    "address registry refresh failed, keeping previous set"
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(period) => {},
            }
        }
        tracing::debug!("address registry stopped");
    }
}
