//! Custodial deposit monitor and sweeper.
//!
//! # Overview
//!
//! Watches a token contract for `transfer` calls into custodial sub-wallets,
//! moves the deposited tokens into the core wallet and records each deposit
//! exactly once.
//!
//! Build a [`sweep::Sweeper`] from a [`ledger::RpcLedger`] talking to the
//! node and your own [`repository`] and [`keys::KeyDecryptor`]
//! implementations, then pass it to [`monitor::Monitor::start`] to run the
//! address registry refresh loop and the block scanner side by side.
//!
//! Each new block flows through
//! [`scanner::Scanner`] → [`decode::transfer_call`] → [`registry`] membership →
//! [`gate::BalanceGate`] (on the live token balance) →
//! [`sweep::Sweeper::handle_deposit`] (gas top-up, token transfer, deposit
//! record).
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Deposits made before startup are not backfilled; the scan starts at the
//!   chain head.
//!
//! * Chain reorganizations are not handled, a block is final once the node
//!   returns it.
//!
//! * A deposit whose sweep failed, or which stayed below the minimum, is
//!   retried only when another transfer to the same address shows up.
//!
//! * Transactions from one signer are serialized per [`sweep::Sweeper`]
//!   only. Anything else signing with the core wallet key has to go through
//!   [`sweep::Sweeper::withdraw_from_core`] on the sweeper the monitor was
//!   started with.
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `testing` | yes | Enables [`testing`] module. |
//!
//! # Testing
//!
//! [`testing`] module provides an in-process ledger with scripted balances,
//! blocks and failures.

pub mod abi;
pub mod config;
pub mod decode;
pub mod error;
pub mod gate;
pub mod keys;
pub mod ledger;
pub mod monitor;
pub mod num;
pub mod registry;
pub mod repository;
pub mod scanner;
pub mod sweep;
#[cfg(feature = "testing")]
pub mod testing;
pub mod tx;
pub mod types;

use alloy::primitives::{Address, address};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Chain and token the deposits are made on.
pub struct Network {
    chain_id: u64,
    token: Address,
    token_decimals: u8,
    native_decimals: u8,
}

impl Network {
    /// BSC mainnet, BEP-20 USDT.
    pub fn bsc_mainnet() -> Self {
        Self {
            chain_id: 56,
            token: address!("0x55d398326f99059fF775485246999027B3197955"),
            token_decimals: 18,
            native_decimals: 18,
        }
    }

    pub fn custom(chain_id: u64, token: Address, token_decimals: u8, native_decimals: u8) -> Self {
        Self { chain_id, token, token_decimals, native_decimals }
    }

    pub fn chain_id(&self) -> u64 { self.chain_id }

    /// Watched token contract.
    pub fn token(&self) -> Address { self.token }

    pub fn token_decimals(&self) -> u8 { self.token_decimals }

    pub fn native_decimals(&self) -> u8 { self.native_decimals }
}
