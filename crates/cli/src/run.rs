use std::{path::Path, sync::Arc, time::Duration};

use alloy::primitives::Address;
use anyhow::Context;
use deposit_sweeper::{
    config::MonitorConfig,
    keys::PlaintextKeys,
    monitor::Monitor,
    repository::MemoryStore,
    sweep::Sweeper,
    types::{SubWalletId, Wallet},
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry of the wallets file.
#[derive(Deserialize)]
struct WalletEntry {
    id: SubWalletId,
    address: Address,
    encrypted_key: String,
    #[serde(default)]
    key_material: String,
    #[serde(default)]
    salt: String,
}

impl From<WalletEntry> for Wallet {
    fn from(entry: WalletEntry) -> Self {
        Wallet {
            id: entry.id,
            address: entry.address,
            encrypted_key: entry.encrypted_key,
            key_material: entry.key_material,
            salt: entry.salt,
        }
    }
}

fn load_wallets(path: &Path) -> anyhow::Result<Vec<Wallet>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading wallets file {}", path.display()))?;
    let entries: Vec<WalletEntry> = serde_json::from_str(&json)
        .with_context(|| format!("parsing wallets file {}", path.display()))?;
    Ok(entries.into_iter().map(Wallet::from).collect())
}

pub(crate) async fn monitor(
    config: MonitorConfig,
    ledger: crate::Ledger,
    wallets: &Path,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_wallets(load_wallets(wallets)?));
    tracing::warn!(
        "deposit records are kept in memory only and are lost on exit, \
         reconcile from the logs"
    );

    let sweeper = Sweeper::new(
        Arc::new(config),
        Arc::new(ledger),
        store.clone(),
        store.clone(),
        Arc::new(PlaintextKeys),
    );
    let handle = Monitor::start(Arc::new(sweeper)).await.context("starting deposit monitor")?;

    cancellation_token.cancelled().await;

    match handle.shutdown_timeout(SHUTDOWN_TIMEOUT).await {
        Some(cursor) => tracing::info!(next_height = cursor.next(), "deposit monitor stopped"),
        None => tracing::warn!("deposit monitor did not stop cleanly"),
    }
    tracing::info!(deposits = store.deposits().len(), "deposits recorded in this session");
    Ok(())
}
