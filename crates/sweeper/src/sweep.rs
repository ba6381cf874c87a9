//! Sweep of detected deposits into the core wallet.
//!
//! A sweep is: optional gas top-up of the sub-wallet from the core wallet,
//! token transfer from the sub-wallet to the core wallet, then one deposit
//! record. Any failure before the record leaves the repositories untouched;
//! re-running a sweep for the same deposit transaction is safe since the
//! deposit repository deduplicates on `(sub_wallet_id, tx_hash)`.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use fastnum::UD128;
use crate::{
    abi::IERC20,
    config::{MonitorConfig, NATIVE_TRANSFER_GAS_LIMIT},
    error::{LedgerError, SweepError},
    keys::{self, KeyDecryptor},
    ledger::Ledger,
    num::Converter,
    repository::{DepositRepository, RecordOutcome, WalletRepository},
    tx::{GasLimit, TxRequest, TxSubmitter},
    types::{DepositRecord, GasFundingRequest, TransferResult},
};

/// Gas-limit margin over the node estimate for token transfers, in percent.
pub const TRANSFER_GAS_MARGIN_PERCENT: u64 = 10;

/// Completed sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct Sweep {
    /// Gas top-up, if one was needed.
    pub gas_funding: Option<TransferResult>,
    /// Token transfer into the core wallet.
    pub transfer: TransferResult,
    pub record: DepositRecord,
    pub outcome: RecordOutcome,
}

/// Receiver of deposits that cleared the balance gate.
pub trait DepositHandler: Send + Sync {
    /// Sweeps `raw_balance` (raw token units) from `address`, crediting the
    /// deposit made by `tx_hash`.
    fn handle_deposit(
        &self,
        tx_hash: TxHash,
        address: Address,
        raw_balance: U256,
    ) -> impl Future<Output = Result<Sweep, SweepError>> + Send;
}

pub struct Sweeper<L, W, D, K> {
    config: Arc<MonitorConfig>,
    ledger: Arc<L>,
    wallets: Arc<W>,
    deposits: Arc<D>,
    keys: Arc<K>,
    submitter: TxSubmitter<L>,
    token: Converter,
    native: Converter,
}

impl<L, W, D, K> Sweeper<L, W, D, K>
where
    L: Ledger,
    W: WalletRepository,
    D: DepositRepository,
    K: KeyDecryptor,
{
    pub fn new(
        config: Arc<MonitorConfig>,
        ledger: Arc<L>,
        wallets: Arc<W>,
        deposits: Arc<D>,
        keys: Arc<K>,
    ) -> Self {
        let network = config.network();
        let submitter =
            TxSubmitter::new(ledger.clone(), network.chain_id(), config.intervals());
        Self {
            token: Converter::new(network.token_decimals()),
            native: Converter::new(network.native_decimals()),
            config,
            ledger,
            wallets,
            deposits,
            keys,
            submitter,
        }
    }

    pub fn config(&self) -> &Arc<MonitorConfig> { &self.config }

    pub fn ledger(&self) -> &Arc<L> { &self.ledger }

    pub fn wallets(&self) -> &Arc<W> { &self.wallets }

    /// Native-currency budget for one token transfer at the current gas
    /// price, in wei, rounded to the configured precision.
    pub async fn gas_budget(&self) -> Result<U256, LedgerError> {
        let gas_price = self.ledger.gas_price().await?;
        let raw = U256::from(self.config.transfer_gas_limit()) * U256::from(gas_price);
        Ok(self.native.round(raw, self.config.gas_precision()))
    }

    /// Tops up the native balance of `address` to the gas budget if it's at
    /// or below it.
    pub async fn ensure_gas(&self, address: Address) -> Result<Option<TransferResult>, SweepError> {
        let funding = |source| SweepError::GasFunding { address, source };
        let (budget, balance) =
            futures::try_join!(self.gas_budget(), self.ledger.native_balance(address))
                .map_err(funding)?;
        if balance > budget {
            return Ok(None);
        }
        let request = GasFundingRequest {
            from: self.config.core_wallet(),
            to: address,
            amount: budget - balance,
        };
        if request.amount.is_zero() {
            return Ok(None);
        }
        let amount = self.native.from_unsigned(request.amount)?;
        tracing::info!(
            address = %request.to,
            balance = %self.native.format(balance),
            budget = %self.native.format(budget),
            amount = %amount,
            "topping up gas"
        );

        let receipt = self
            .submitter
            .submit(
                self.config.core_signer(),
                TxRequest {
                    to: request.to,
                    value: request.amount,
                    input: Bytes::new(),
                    gas_limit: GasLimit::Fixed(NATIVE_TRANSFER_GAS_LIMIT),
                },
            )
            .await
            .map_err(funding)?;
        if !receipt.success {
            return Err(SweepError::GasFundingReverted(receipt.tx_hash));
        }
        Ok(Some(TransferResult {
            tx_hash: receipt.tx_hash,
            from: request.from,
            to: request.to,
            amount,
            gas_cost: receipt.fee(),
            confirmed_at: chrono::Utc::now(),
        }))
    }

    /// Sends `raw` tokens, `amount` in token units, from the `signer`
    /// address to `to`.
    async fn transfer_token(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        raw: U256,
        amount: UD128,
    ) -> Result<TransferResult, SweepError> {
        let input = IERC20::transferCall { to, amount: raw }.abi_encode();
        let receipt = self
            .submitter
            .submit(
                signer,
                TxRequest {
                    to: self.config.network().token(),
                    value: U256::ZERO,
                    input: input.into(),
                    gas_limit: GasLimit::Estimate {
                        margin_percent: TRANSFER_GAS_MARGIN_PERCENT,
                    },
                },
            )
            .await
            .map_err(SweepError::Transfer)?;
        if !receipt.success {
            return Err(SweepError::TransferReverted(receipt.tx_hash));
        }
        Ok(TransferResult {
            tx_hash: receipt.tx_hash,
            from: signer.address(),
            to,
            amount,
            gas_cost: receipt.fee(),
            confirmed_at: chrono::Utc::now(),
        })
    }

    /// Sends tokens from the core wallet, e.g. to pay out a withdrawal.
    ///
    /// Submissions are serialized with gas top-ups, both being signed by the
    /// core wallet.
    pub async fn withdraw_from_core(
        &self,
        to: Address,
        amount: UD128,
    ) -> Result<TransferResult, SweepError> {
        if amount.is_zero() {
            return Err(SweepError::InvalidAmount("withdrawal amount must be positive".to_string()));
        }
        let raw = self.token.to_unsigned(amount)?;
        let result = self.transfer_token(self.config.core_signer(), to, raw, amount).await?;
        tracing::info!(
            tx_hash = %result.tx_hash,
            to = %result.to,
            amount = %result.amount,
            gas_cost = %self.native.format(result.gas_cost),
            "withdrawal confirmed"
        );
        Ok(result)
    }
}

impl<L, W, D, K> DepositHandler for Sweeper<L, W, D, K>
where
    L: Ledger,
    W: WalletRepository,
    D: DepositRepository,
    K: KeyDecryptor,
{
    async fn handle_deposit(
        &self,
        tx_hash: TxHash,
        address: Address,
        raw_balance: U256,
    ) -> Result<Sweep, SweepError> {
        let amount = self.token.from_unsigned(raw_balance)?;
        let wallet = self
            .wallets
            .find_wallet_by_address(address)
            .await?
            .ok_or(SweepError::UnknownWallet(address))?;

        let gas_funding = self.ensure_gas(address).await?;
        if let Some(funding) = &gas_funding {
            tracing::info!(
                address = %address,
                funding_tx = %funding.tx_hash,
                amount = %funding.amount,
                "gas top-up confirmed"
            );
        }

        let signer = keys::wallet_signer(&*self.keys, &wallet)?;
        let transfer = self
            .transfer_token(&signer, self.config.core_wallet(), raw_balance, amount)
            .await?;
        tracing::info!(
            %tx_hash,
            sweep_tx = %transfer.tx_hash,
            address = %address,
            amount = %amount,
            gas_cost = %self.native.format(transfer.gas_cost),
            "deposit swept"
        );

        let record = DepositRecord {
            sub_wallet_id: wallet.id,
            currency_id: self.config.currency_id(),
            amount,
            fee: self.config.deposit_fee(),
            tx_hash,
        };
        let outcome = self.deposits.record_deposit(&record).await?;
        match outcome {
            RecordOutcome::Recorded => tracing::info!(
                %tx_hash,
                sub_wallet_id = wallet.id,
                amount = %amount,
                "deposit recorded"
            ),
            RecordOutcome::Duplicate => tracing::warn!(
                %tx_hash,
                sub_wallet_id = wallet.id,
                "deposit was already recorded"
            ),
        }
        Ok(Sweep { gas_funding, transfer, record, outcome })
    }
}
