pub mod args;
mod decode;
mod run;
mod withdraw;

use std::time::Duration;

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::layers::{RetryBackoffLayer, ThrottleLayer},
};
use anyhow::Context;
use args::Cli;
use deposit_sweeper::{
    Network,
    config::{Intervals, MonitorConfig},
    ledger::RpcLedger,
};
use fastnum::UD128;
use tokio_util::sync::CancellationToken;

use crate::args::Commands;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run { wallets } => {
            let (config, ledger) = connect(&cli).await?;

            let cancellation_signal = CancellationToken::new();
            let cancellation_token = cancellation_signal.child_token();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("interrupted, shutting down"),
                    Err(err) => tracing::error!(%err, "failed to install CTRL+C signal handler"),
                }
                cancellation_signal.cancel();
            });

            run::monitor(config, ledger, wallets, cancellation_token).await?
        },
        Commands::Decode { payload } => {
            decode::render(payload, cli.transfer_selector, cli.token_decimals)?
        },
        Commands::Withdraw { to, amount } => {
            let amount = parse_amount(amount)?;
            let (config, ledger) = connect(&cli).await?;
            withdraw::render(config, ledger, *to, amount).await?
        },
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<(MonitorConfig, Ledger)> {
    let client = if cli.rpc == args::DEFAULT_RPC_PROVIDER || cli.rpc_throttle.is_some() {
        // Apply throttling with default RPC
        RpcClient::builder()
            .layer(ThrottleLayer::new(cli.rpc_throttle.unwrap_or(args::DEFAULT_RPC_THROTTLING)))
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    } else {
        RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    };
    client.set_poll_interval(Duration::from_millis(500));
    let provider = ProviderBuilder::new().connect_client(client).erased();

    let chain_id = match cli.chain_id {
        Some(chain_id) => chain_id,
        None => provider.get_chain_id().await.context("fetching chain ID")?,
    };
    Ok((monitor_config(cli, chain_id)?, RpcLedger::new(provider)))
}

fn monitor_config(cli: &Cli, chain_id: u64) -> anyhow::Result<MonitorConfig> {
    let core_signer = cli
        .core_private_key
        .clone()
        .context("core wallet private key is required, see `--core-private-key`")?;
    let core_wallet = cli.core_wallet.unwrap_or(core_signer.address());

    let bsc = Network::bsc_mainnet();
    let network = Network::custom(
        chain_id,
        cli.token.unwrap_or(bsc.token()),
        cli.token_decimals,
        bsc.native_decimals(),
    );

    let config = MonitorConfig::new(network, core_wallet, core_signer)?
        .with_transfer_selector(cli.transfer_selector)
        .with_min_deposit(parse_amount(&cli.min_deposit).context("invalid minimum deposit")?)
        .with_deposit_fee(parse_amount(&cli.deposit_fee).context("invalid deposit fee")?)
        .with_currency_id(cli.currency_id)
        .with_transfer_gas_limit(cli.transfer_gas_limit)
        .with_gas_precision(cli.gas_precision)
        .with_intervals(Intervals {
            refresh: Duration::from_secs(cli.refresh_interval),
            ..Default::default()
        });
    config.validate()?;
    Ok(config)
}

fn parse_amount(s: &str) -> anyhow::Result<UD128> {
    s.trim().parse::<UD128>().map_err(|err| anyhow::anyhow!("invalid amount {s:?}: {err}"))
}

type Ledger = RpcLedger<DynProvider>;
