//! Monitor configuration.
//!
//! Built once at startup and handed to each component; nothing below this
//! module reads the environment.

use std::time::Duration;

use alloy::{
    primitives::{Address, FixedBytes},
    signers::local::PrivateKeySigner,
};
use fastnum::{UD128, udec128};

use crate::{Network, abi, error::ConfigError, types::CurrencyId};

/// Fixed gas estimate for a token transfer, used to size gas top-ups.
pub const DEFAULT_TRANSFER_GAS_LIMIT: u64 = 60_000;

/// Gas limit of a plain native-currency transfer.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Decimal places the gas budget is rounded to.
pub const DEFAULT_GAS_PRECISION: u8 = 8;

/// Currency the deposits are credited in.
pub const DEFAULT_CURRENCY_ID: CurrencyId = 2;

/// Loop timings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    /// Address registry refresh period.
    pub refresh: Duration,
    /// Pause when the scanner has caught up with the chain head.
    pub caught_up: Duration,
    /// Pause after the node could not be reached.
    pub connectivity_backoff: Duration,
    /// Pause after any other scan failure.
    pub error_backoff: Duration,
    /// Receipt polling period.
    pub receipt_poll: Duration,
    /// Give up waiting for a receipt after this long.
    pub receipt_timeout: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(15),
            caught_up: Duration::from_secs(2),
            connectivity_backoff: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            receipt_poll: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone, derive_more::Debug)]
pub struct MonitorConfig {
    network: Network,
    transfer_selector: FixedBytes<4>,
    core_wallet: Address,
    #[debug(skip)]
    core_signer: PrivateKeySigner,
    #[debug("{min_deposit}")]
    min_deposit: UD128,
    #[debug("{deposit_fee}")]
    deposit_fee: UD128,
    currency_id: CurrencyId,
    transfer_gas_limit: u64,
    gas_precision: u8,
    intervals: Intervals,
}

impl MonitorConfig {
    /// Configuration with defaults of the original BEP-20 USDT deployment.
    ///
    /// Fails if `core_wallet` is not the address of `core_signer`.
    pub fn new(
        network: Network,
        core_wallet: Address,
        core_signer: PrivateKeySigner,
    ) -> Result<Self, ConfigError> {
        if core_signer.address() != core_wallet {
            return Err(ConfigError::CoreWalletMismatch {
                configured: core_wallet,
                derived: core_signer.address(),
            });
        }
        Ok(Self {
            network,
            transfer_selector: abi::TRANSFER_SELECTOR,
            core_wallet,
            core_signer,
            min_deposit: udec128!(10),
            deposit_fee: UD128::ZERO,
            currency_id: DEFAULT_CURRENCY_ID,
            transfer_gas_limit: DEFAULT_TRANSFER_GAS_LIMIT,
            gas_precision: DEFAULT_GAS_PRECISION,
            intervals: Intervals::default(),
        })
    }

    pub fn with_transfer_selector(mut self, selector: FixedBytes<4>) -> Self {
        self.transfer_selector = selector;
        self
    }

    pub fn with_min_deposit(mut self, min_deposit: UD128) -> Self {
        self.min_deposit = min_deposit;
        self
    }

    pub fn with_deposit_fee(mut self, fee: UD128) -> Self {
        self.deposit_fee = fee;
        self
    }

    pub fn with_currency_id(mut self, currency_id: CurrencyId) -> Self {
        self.currency_id = currency_id;
        self
    }

    pub fn with_transfer_gas_limit(mut self, gas_limit: u64) -> Self {
        self.transfer_gas_limit = gas_limit;
        self
    }

    pub fn with_gas_precision(mut self, precision: u8) -> Self {
        self.gas_precision = precision;
        self
    }

    pub fn with_intervals(mut self, intervals: Intervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Checks settings that can't be enforced by the setters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intervals.refresh.is_zero() {
            return Err(ConfigError::InvalidArgument(
                "refresh interval must be positive".to_string(),
            ));
        }
        if self.transfer_gas_limit == 0 {
            return Err(ConfigError::InvalidArgument(
                "transfer gas limit must be positive".to_string(),
            ));
        }
        if self.gas_precision > self.network.native_decimals() {
            return Err(ConfigError::InvalidArgument(format!(
                "gas precision {} exceeds native currency decimals {}",
                self.gas_precision,
                self.network.native_decimals()
            )));
        }
        Ok(())
    }

    pub fn network(&self) -> &Network { &self.network }

    pub fn transfer_selector(&self) -> FixedBytes<4> { self.transfer_selector }

    pub fn core_wallet(&self) -> Address { self.core_wallet }

    pub fn core_signer(&self) -> &PrivateKeySigner { &self.core_signer }

    pub fn min_deposit(&self) -> UD128 { self.min_deposit }

    pub fn deposit_fee(&self) -> UD128 { self.deposit_fee }

    pub fn currency_id(&self) -> CurrencyId { self.currency_id }

    pub fn transfer_gas_limit(&self) -> u64 { self.transfer_gas_limit }

    pub fn gas_precision(&self) -> u8 { self.gas_precision }

    pub fn intervals(&self) -> &Intervals { &self.intervals }
}
