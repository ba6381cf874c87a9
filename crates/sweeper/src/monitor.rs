//! Deposit monitor: the address registry refresh loop and the block scan loop
//! running side by side.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ConfigError, LedgerError},
    keys::KeyDecryptor,
    ledger::Ledger,
    registry::{AddressRegistry, RegistryHealth},
    repository::{DepositRepository, WalletRepository},
    scanner::{BlockCursor, Scanner},
    sweep::Sweeper,
};

/// Failure that prevents the monitor from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ledger is not reachable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("ledger serves chain {actual}, configured for {expected}")]
    ChainMismatch { expected: u64, actual: u64 },
}

pub struct Monitor;

impl Monitor {
    /// Checks the configuration against the ledger, loads the watched
    /// addresses and spawns both loops on the current runtime.
    ///
    /// The scanner sweeps through `sweeper`. Keep a clone of it to withdraw
    /// from the core wallet while the monitor runs: core wallet transactions
    /// are only serialized within one sweeper.
    ///
    /// A failing initial address load is not fatal, the refresh loop keeps
    /// retrying.
    pub async fn start<L, W, D, K>(
        sweeper: Arc<Sweeper<L, W, D, K>>,
    ) -> Result<MonitorHandle, StartupError>
    where
        L: Ledger + 'static,
        W: WalletRepository + 'static,
        D: DepositRepository + 'static,
        K: KeyDecryptor + 'static,
    {
        let config = sweeper.config().clone();
        let ledger = sweeper.ledger().clone();
        let wallets = sweeper.wallets().clone();

        config.validate()?;
        let expected = config.network().chain_id();
        let actual = ledger.chain_id().await?;
        if actual != expected {
            return Err(StartupError::ChainMismatch { expected, actual });
        }

        let registry = Arc::new(AddressRegistry::new());
        match registry.refresh(&*wallets).await {
            Ok(set) => tracing::info!(addresses = set.len(), "watched addresses loaded"),
            Err(err) => tracing::warn!(%err, "initial address load failed"),
        }

        let scanner = Scanner::start(config.clone(), ledger, registry.clone(), sweeper).await?;

        let cancel = CancellationToken::new();
        let period = config.intervals().refresh;
        let refresh_task = tokio::spawn({
            let (registry, cancel) = (registry.clone(), cancel.clone());
            async move { registry.run(&*wallets, period, cancel, tokio::time::sleep).await }
        });
        let scan_task = tokio::spawn(scanner.run(cancel.clone(), tokio::time::sleep));

        tracing::info!(
            chain_id = expected,
            token = %config.network().token(),
            core_wallet = %config.core_wallet(),
            min_deposit = %config.min_deposit(),
            "deposit monitor started"
        );
        Ok(MonitorHandle { registry, cancel, refresh_task, scan_task })
    }
}

/// Handle of the running monitor.
pub struct MonitorHandle {
    registry: Arc<AddressRegistry>,
    cancel: CancellationToken,
    refresh_task: JoinHandle<()>,
    scan_task: JoinHandle<BlockCursor>,
}

impl MonitorHandle {
    pub fn registry(&self) -> &Arc<AddressRegistry> { &self.registry }

    pub fn health(&self) -> RegistryHealth { self.registry.health() }

    /// Token that stops both loops once cancelled.
    pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

    /// Stops both loops, letting the block in progress finish, and returns
    /// the next height that would have been scanned.
    pub async fn shutdown(self) -> Option<BlockCursor> {
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for both loops to stop.
    pub async fn join(self) -> Option<BlockCursor> {
        let (refresh, scan) = tokio::join!(self.refresh_task, self.scan_task);
        if let Err(err) = refresh {
            tracing::error!(%err, "address registry task failed");
        }
        match scan {
            Ok(cursor) => Some(cursor),
            Err(err) => {
                tracing::error!(%err, "block scanner task failed");
                None
            },
        }
    }

    /// Like [`Self::shutdown`], giving up on the loops after `timeout`.
    pub async fn shutdown_timeout(self, timeout: Duration) -> Option<BlockCursor> {
        self.cancel.cancel();
        tokio::time::timeout(timeout, self.join()).await.ok().flatten()
    }
}
