use std::sync::Arc;

use alloy::primitives::{Address, utils::format_ether};
use anyhow::Context;
use colored::Colorize;
use deposit_sweeper::{
    config::MonitorConfig, keys::PlaintextKeys, repository::MemoryStore, sweep::Sweeper,
};
use fastnum::UD128;

pub(crate) async fn render(
    config: MonitorConfig,
    ledger: crate::Ledger,
    to: Address,
    amount: UD128,
) -> anyhow::Result<()> {
    // Withdrawals touch neither sub-wallets nor deposits
    let store = Arc::new(MemoryStore::new());
    let sweeper =
        Sweeper::new(Arc::new(config), Arc::new(ledger), store.clone(), store, Arc::new(PlaintextKeys));

    let result = sweeper
        .withdraw_from_core(to, amount)
        .await
        .context("withdrawing from core wallet")?;

    println!("\n{}\n", format!("**** Tx {}", result.tx_hash).bright_blue());
    println!("{}", format!("  from:     {}", result.from).cyan());
    println!("{}", format!("  to:       {}", result.to).cyan());
    println!("{}", format!("  amount:   {}", result.amount).cyan());
    println!("{}", format!("  gas cost: {}", format_ether(result.gas_cost)).cyan());
    println!("{}", format!("  at:       {}", result.confirmed_at.to_rfc3339()).cyan());
    println!();

    Ok(())
}
