//! Sequential block scanner.
//!
//! [`Scanner::step`] processes at most one block; [`Scanner::run`] repeats
//! it with the configured pauses until cancelled. The cursor only moves after
//! every transaction of a block was looked at, so a failed block is retried
//! as a whole.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::MonitorConfig,
    decode,
    error::{LedgerError, SweepError},
    gate::BalanceGate,
    ledger::Ledger,
    num::Converter,
    registry::{AddressRegistry, AddressSet},
    sweep::DepositHandler,
    types::{CandidateTransfer, LedgerBlock, LedgerTransaction},
};

/// Next block to scan. Never moves backwards or skips a height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockCursor {
    next: u64,
}

impl BlockCursor {
    pub fn new(next: u64) -> Self { Self { next } }

    pub fn next(&self) -> u64 { self.next }

    fn advance(&mut self) { self.next += 1; }
}

/// Outcome of one [`Scanner::step`].
#[derive(Debug)]
pub enum Step {
    /// Cursor is past the chain head, or the node doesn't serve the block
    /// yet.
    CaughtUp,
    /// Block was scanned and the cursor advanced.
    Processed {
        height: u64,
        /// Deposits swept and recorded from this block.
        swept: usize,
    },
    /// Block could not be scanned, cursor stays.
    Failed(LedgerError),
}

pub struct Scanner<L, H> {
    config: Arc<MonitorConfig>,
    ledger: Arc<L>,
    registry: Arc<AddressRegistry>,
    handler: Arc<H>,
    gate: BalanceGate,
    token: Converter,
    cursor: BlockCursor,
}

impl<L: Ledger, H: DepositHandler> Scanner<L, H> {
    /// Scanner positioned at the current chain head.
    ///
    /// Blocks before the head are not scanned.
    pub async fn start(
        config: Arc<MonitorConfig>,
        ledger: Arc<L>,
        registry: Arc<AddressRegistry>,
        handler: Arc<H>,
    ) -> Result<Self, LedgerError> {
        let head = ledger.block_number().await?;
        tracing::info!(height = head, "block scanner starting at chain head");
        Ok(Self::with_cursor(config, ledger, registry, handler, BlockCursor::new(head)))
    }

    pub fn with_cursor(
        config: Arc<MonitorConfig>,
        ledger: Arc<L>,
        registry: Arc<AddressRegistry>,
        handler: Arc<H>,
        cursor: BlockCursor,
    ) -> Self {
        Self {
            gate: BalanceGate::new(config.min_deposit()),
            token: Converter::new(config.network().token_decimals()),
            config,
            ledger,
            registry,
            handler,
            cursor,
        }
    }

    pub fn cursor(&self) -> BlockCursor { self.cursor }

    /// Scans the block at the cursor if it's available.
    pub async fn step(&mut self) -> Step {
        let height = self.cursor.next();
        let block = async {
            let head = self.ledger.block_number().await?;
            if height > head {
                return Ok(None);
            }
            self.ledger.block(height).await
        };
        let block = match block.await {
            Ok(Some(block)) => block,
            Ok(None) => return Step::CaughtUp,
            Err(err) => return Step::Failed(err),
        };
        match self.process_block(&block).await {
            Ok(swept) => {
                self.cursor.advance();
                tracing::debug!(
                    height,
                    transactions = block.transactions.len(),
                    swept,
                    "block scanned"
                );
                Step::Processed { height, swept }
            },
            Err(err) => Step::Failed(err),
        }
    }

    async fn process_block(&self, block: &LedgerBlock) -> Result<usize, LedgerError> {
        let watched = self.registry.snapshot();
        let mut swept = 0;
        for tx in &block.transactions {
            let Some(candidate) = self.candidate(tx, &watched) else {
                continue;
            };
            if self.dispatch(candidate).await? {
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Transfer call of the watched token to a watched address.
    fn candidate(&self, tx: &LedgerTransaction, watched: &AddressSet) -> Option<CandidateTransfer> {
        if tx.to != Some(self.config.network().token()) {
            return None;
        }
        let call = match decode::transfer_call(&tx.input, self.config.transfer_selector()) {
            Ok(call) => call,
            Err(skip) => {
                tracing::trace!(tx_hash = %tx.hash, %skip, "not a transfer call");
                return None;
            },
        };
        if !watched.contains(&call.to) {
            return None;
        }
        Some(CandidateTransfer {
            tx_hash: tx.hash,
            sender: tx.from,
            destination: call.to,
            raw_amount: call.amount,
        })
    }

    /// Checks the live balance of the destination and hands it to the
    /// deposit handler. Returns whether a deposit was swept.
    ///
    /// Only a failed balance read is an error; sweep failures are logged.
    async fn dispatch(&self, candidate: CandidateTransfer) -> Result<bool, LedgerError> {
        let address = candidate.destination;
        let raw_balance = self
            .ledger
            .token_balance(self.config.network().token(), address)
            .await?;
        let balance = match self.token.from_unsigned(raw_balance) {
            Ok(balance) => balance,
            Err(err) => {
                tracing::error!(
                    tx_hash = %candidate.tx_hash,
                    address = %address,
                    raw_balance = %raw_balance,
                    %err,
                    "balance not representable, deposit not actioned"
                );
                return Ok(false);
            },
        };
        tracing::info!(
            tx_hash = %candidate.tx_hash,
            sender = %candidate.sender,
            address = %address,
            transferred = %self.token.format(candidate.raw_amount),
            balance = %balance,
            "incoming transfer to watched address"
        );

        if !self.gate.clears(balance) {
            tracing::warn!(
                tx_hash = %candidate.tx_hash,
                address = %address,
                balance = %balance,
                threshold = %self.gate.threshold(),
                "balance below minimum deposit, dropped"
            );
            return Ok(false);
        }

        match self.handler.handle_deposit(candidate.tx_hash, address, raw_balance).await {
            Ok(_) => Ok(true),
            Err(err @ SweepError::UnknownWallet(_)) => {
                tracing::warn!(tx_hash = %candidate.tx_hash, %err, "deposit not actioned");
                Ok(false)
            },
            Err(err) => {
                tracing::error!(
                    tx_hash = %candidate.tx_hash,
                    address = %address,
                    amount = %balance,
                    %err,
                    "sweep failed, deposit not recorded"
                );
                Ok(false)
            },
        }
    }

    /// Scans blocks until `cancel` fires, pausing with `sleep` when caught up
    /// or after a failure. Returns the final cursor.
    ///
    /// Cancellation is only observed between steps, a block is never
    /// abandoned half-processed.
    pub async fn run<S, SFut>(mut self, cancel: CancellationToken, sleep: S) -> BlockCursor
    where
        S: Fn(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let intervals = *self.config.intervals();
        while !cancel.is_cancelled() {
            let pause = match self.step().await {
                Step::Processed { .. } => continue,
                Step::CaughtUp => intervals.caught_up,
                Step::Failed(err) if err.is_connectivity() => {
                    tracing::error!(height = self.cursor.next(), %err, "ledger unreachable, backing off");
                    intervals.connectivity_backoff
                },
                Step::Failed(err) => {
                    tracing::error!(height = self.cursor.next(), %err, "block scan failed, retrying");
                    intervals.error_backoff
                },
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {},
            }
        }
        tracing::info!(next_height = self.cursor.next(), "block scanner stopped");
        self.cursor
    }
}
