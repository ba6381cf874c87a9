use std::path::PathBuf;

use alloy::{
    primitives::{Address, FixedBytes},
    signers::local::PrivateKeySigner,
};
use clap::{Parser, Subcommand};
use deposit_sweeper::{abi, config};

pub(crate) const DEFAULT_RPC_PROVIDER: &str = "https://bsc-dataseed.bnbchain.org";
pub(crate) const DEFAULT_RPC_THROTTLING: u32 = 15;

#[derive(Parser, Debug)]
#[command(name = "deposit-sweeper", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// RPC endpoint to connect to
    #[arg(long, global = true, env = "NODE_URL", default_value_t = DEFAULT_RPC_PROVIDER.to_string())]
    pub rpc: String,

    /// RPC throttling (req/sec) [default: 15 for default RPC provider and
    /// none for custom]
    #[arg(long, global = true, env = "RPC_THROTTLE")]
    pub rpc_throttle: Option<u32>,

    /// Chain ID the node is expected to serve [default: whatever the node
    /// reports]
    #[arg(long, global = true, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Watched token contract [default: BEP-20 USDT]
    #[arg(long, global = true, env = "TOKEN_CONTRACT_ADDRESS")]
    pub token: Option<Address>,

    /// Decimals of the watched token
    #[arg(long, global = true, env = "TOKEN_DECIMALS", default_value_t = 18)]
    pub token_decimals: u8,

    /// Selector of the token transfer method
    #[arg(long, global = true, env = "TRANSFER_METHOD_ID", default_value_t = abi::TRANSFER_SELECTOR)]
    pub transfer_selector: FixedBytes<4>,

    /// Core wallet deposits are swept into
    #[arg(long, global = true, env = "CORE_WALLET_ADDRESS")]
    pub core_wallet: Option<Address>,

    /// Private key of the core wallet
    #[arg(long, global = true, env = "CORE_WALLET_PRIVATE_KEY", hide_env_values = true)]
    pub core_private_key: Option<PrivateKeySigner>,

    /// Minimum token balance of a sub-wallet to sweep
    #[arg(long, global = true, env = "MIN_DEPOSIT", default_value = "10")]
    pub min_deposit: String,

    /// Deposit fee charged on every credited deposit
    #[arg(long, global = true, env = "DEPOSIT_FEE", default_value = "0")]
    pub deposit_fee: String,

    /// Currency ID deposits are credited in
    #[arg(long, global = true, env = "DEPOSIT_CURRENCY_ID", default_value_t = config::DEFAULT_CURRENCY_ID)]
    pub currency_id: u32,

    /// Address registry refresh interval, in seconds
    #[arg(long, global = true, env = "REFRESH_INTERVAL_SECS", default_value_t = 15)]
    pub refresh_interval: u64,

    /// Gas limit a token transfer is budgeted with when topping up gas
    #[arg(long, global = true, env = "TRANSFER_GAS_LIMIT", default_value_t = config::DEFAULT_TRANSFER_GAS_LIMIT)]
    pub transfer_gas_limit: u64,

    /// Decimal places the gas budget is rounded to
    #[arg(long, global = true, env = "GAS_PRECISION", default_value_t = config::DEFAULT_GAS_PRECISION)]
    pub gas_precision: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch new blocks for deposits to custodial wallets and sweep them into
    /// the core wallet, until terminated (Ctrl+C). Deposit records are kept in
    /// memory only and are lost on exit
    Run {
        /// JSON file with the custodial wallets
        #[arg(long, env = "WALLETS_FILE")]
        wallets: PathBuf,
    },
    /// Decode token transfer calldata
    Decode {
        /// Hex-encoded transaction input
        payload: String,
    },
    /// Send tokens from the core wallet. Don't use while `run` is active for
    /// the same core wallet, nonces are not coordinated across processes
    Withdraw {
        /// Recipient address
        #[arg(long)]
        to: Address,

        /// Amount, in token units
        #[arg(long)]
        amount: String,
    },
}
