//! In-process ledger for tests.
//!
//! [`MockLedger`] keeps balances, nonces and blocks in memory, executes
//! submitted native transfers and token `transfer` calls, and mines them
//! instantly. Failures can be scripted per block, for head reads and for
//! balance reads.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use alloy::{
    consensus::TxEnvelope,
    eips::eip2718::Decodable2718,
    hex,
    primitives::{Address, B256, Bytes, TxHash, TxKind, U256, address},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};

use crate::{
    Network,
    abi::IERC20,
    config::NATIVE_TRANSFER_GAS_LIMIT,
    error::LedgerError,
    ledger::{CallRequest, Ledger},
    types::{LedgerBlock, LedgerTransaction, Receipt, Wallet},
};

pub const CHAIN_ID: u64 = 31337;

/// Token contract of [`network`].
pub const TOKEN: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

pub const TOKEN_DECIMALS: u8 = 18;

/// Gas estimate and usage of any contract call.
pub const CALL_GAS_ESTIMATE: u64 = 50_000;

pub const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;

/// Network of [`MockLedger`].
pub fn network() -> Network { Network::custom(CHAIN_ID, TOKEN, TOKEN_DECIMALS, 18) }

/// Deterministic signer, distinct for every `n > 0`.
pub fn signer(n: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(n)).unwrap()
}

/// Sub-wallet controlled by [`signer`]`(n)`, with its key stored in plain
/// hex, see [`crate::keys::PlaintextKeys`].
pub fn wallet(id: crate::types::SubWalletId, n: u8) -> Wallet {
    Wallet {
        id,
        address: signer(n).address(),
        encrypted_key: hex::encode_prefixed(B256::with_last_byte(n)),
        key_material: String::new(),
        salt: String::new(),
    }
}

/// `n` whole tokens in raw units.
pub fn tokens(n: u64) -> U256 { U256::from(n) * U256::from(10).pow(U256::from(TOKEN_DECIMALS)) }

/// Token `transfer(to, amount)` call by a third party.
pub fn transfer_tx(seed: u8, to: Address, amount: U256) -> LedgerTransaction {
    LedgerTransaction {
        hash: TxHash::repeat_byte(seed),
        from: Address::repeat_byte(0xf0),
        to: Some(TOKEN),
        input: IERC20::transferCall { to, amount }.abi_encode().into(),
    }
}

/// Transaction accepted by [`MockLedger::send_raw_transaction`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub value: U256,
    pub input: Bytes,
    pub success: bool,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    blocks: Vec<LedgerBlock>,
    native: HashMap<Address, U256>,
    token: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    gas_price: u128,
    head_failures: Vec<LedgerError>,
    block_failures: HashMap<u64, (LedgerError, usize)>,
    balance_read_failures: usize,
    rejected: HashSet<Address>,
    submitted: Vec<SubmittedTx>,
    receipts: HashMap<TxHash, Receipt>,
    withhold_receipts: bool,
    nonce_latency: Duration,
}

impl Default for State {
    fn default() -> Self {
        Self {
            blocks: vec![LedgerBlock::default()],
            native: HashMap::new(),
            token: HashMap::new(),
            nonces: HashMap::new(),
            gas_price: DEFAULT_GAS_PRICE,
            head_failures: Vec::new(),
            block_failures: HashMap::new(),
            balance_read_failures: 0,
            rejected: HashSet::new(),
            submitted: Vec::new(),
            receipts: HashMap::new(),
            withhold_receipts: false,
            nonce_latency: Duration::ZERO,
        }
    }
}

impl MockLedger {
    /// Ledger with an empty genesis block at height 0.
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap() }

    pub fn head(&self) -> u64 { self.state().blocks.len() as u64 - 1 }

    /// Appends a block on top of the head and returns its height.
    pub fn push_block(&self, transactions: Vec<LedgerTransaction>) -> u64 {
        let mut state = self.state();
        let number = state.blocks.len() as u64;
        state.blocks.push(LedgerBlock { number, timestamp: 1_700_000_000 + number, transactions });
        number
    }

    /// Next `times` reads of block `height` fail with `err`.
    pub fn fail_block(&self, height: u64, err: LedgerError, times: usize) {
        self.state().block_failures.insert(height, (err, times));
    }

    /// Next `times` head reads fail with `err`.
    pub fn fail_head(&self, err: LedgerError, times: usize) {
        self.state().head_failures.extend(std::iter::repeat_n(err, times));
    }

    /// Next `times` token balance reads fail with a connectivity error.
    pub fn fail_balance_reads(&self, times: usize) { self.state().balance_read_failures = times; }

    /// Submissions signed by `address` are rejected by the node.
    pub fn reject_sender(&self, address: Address) { self.state().rejected.insert(address); }

    pub fn set_gas_price(&self, gas_price: u128) { self.state().gas_price = gas_price; }

    /// Transactions are still executed, but their receipts are never served.
    pub fn withhold_receipts(&self) { self.state().withhold_receipts = true; }

    /// Nonce reads take `latency`, leaving room for concurrent submissions
    /// to interleave.
    pub fn set_nonce_latency(&self, latency: Duration) { self.state().nonce_latency = latency; }

    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.state().native.insert(address, balance);
    }

    pub fn set_token_balance(&self, address: Address, balance: U256) {
        self.state().token.insert(address, balance);
    }

    pub fn native_balance_of(&self, address: Address) -> U256 {
        self.state().native.get(&address).copied().unwrap_or_default()
    }

    pub fn token_balance_of(&self, address: Address) -> U256 {
        self.state().token.get(&address).copied().unwrap_or_default()
    }

    /// Accepted transactions, in submission order.
    pub fn submitted(&self) -> Vec<SubmittedTx> { self.state().submitted.clone() }
}

impl State {
    fn execute(&mut self, tx: &mut SubmittedTx) -> Result<(), LedgerError> {
        if self.rejected.contains(&tx.from) {
            return Err(LedgerError::Rpc(format!("transaction from {} rejected", tx.from)));
        }
        let expected = self.nonces.get(&tx.from).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(LedgerError::Rpc(format!("nonce {} != expected {expected}", tx.nonce)));
        }
        let native = self.native.get(&tx.from).copied().unwrap_or_default();
        let max_cost = U256::from(tx.gas_limit) * U256::from(tx.gas_price) + tx.value;
        if native < max_cost {
            return Err(LedgerError::Rpc("insufficient funds for gas * price + value".to_string()));
        }

        self.nonces.insert(tx.from, expected + 1);
        let gas_used =
            (if tx.input.is_empty() { NATIVE_TRANSFER_GAS_LIMIT } else { CALL_GAS_ESTIMATE })
                .min(tx.gas_limit);
        *self.native.entry(tx.from).or_default() -= U256::from(gas_used) * U256::from(tx.gas_price);

        let success = tx.input.is_empty() || self.transfer_tokens(tx);
        tx.success = success;
        if tx.success {
            *self.native.entry(tx.from).or_default() -= tx.value;
            *self.native.entry(tx.to).or_default() += tx.value;
        }
        self.receipts.insert(
            tx.tx_hash,
            Receipt {
                tx_hash: tx.tx_hash,
                success: tx.success,
                gas_used,
                effective_gas_price: tx.gas_price,
            },
        );
        Ok(())
    }

    fn transfer_tokens(&mut self, tx: &SubmittedTx) -> bool {
        if tx.to != TOKEN {
            return false;
        }
        let Ok(call) = IERC20::transferCall::abi_decode(&tx.input) else {
            return false;
        };
        let balance = self.token.get(&tx.from).copied().unwrap_or_default();
        if balance < call.amount {
            return false;
        }
        self.token.insert(tx.from, balance - call.amount);
        *self.token.entry(call.to).or_default() += call.amount;
        true
    }
}

impl Ledger for MockLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> { Ok(CHAIN_ID) }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        if let Some(err) = self.state().head_failures.pop() {
            return Err(err);
        }
        Ok(self.head())
    }

    async fn block(&self, number: u64) -> Result<Option<LedgerBlock>, LedgerError> {
        let mut state = self.state();
        if let Some((err, times)) = state.block_failures.get_mut(&number) {
            if *times > 0 {
                *times -= 1;
                return Err(err.clone());
            }
        }
        Ok(state.blocks.get(number as usize).cloned())
    }

    async fn native_balance(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self.native_balance_of(address))
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, LedgerError> {
        let mut state = self.state();
        if state.balance_read_failures > 0 {
            state.balance_read_failures -= 1;
            return Err(LedgerError::Connectivity("connection reset".to_string()));
        }
        if token != TOKEN {
            return Err(LedgerError::Rpc(format!("no contract at {token}")));
        }
        Ok(state.token.get(&holder).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let latency = self.state().nonce_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(self.state().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, LedgerError> { Ok(self.state().gas_price) }

    async fn estimate_gas(&self, call: CallRequest) -> Result<u64, LedgerError> {
        Ok(if call.input.is_empty() { NATIVE_TRANSFER_GAS_LIMIT } else { CALL_GAS_ESTIMATE })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, LedgerError> {
        let mut buf = raw.as_ref();
        let envelope = TxEnvelope::decode_2718(&mut buf)
            .map_err(|err| LedgerError::Rpc(format!("undecodable transaction: {err}")))?;
        let TxEnvelope::Legacy(signed) = envelope else {
            return Err(LedgerError::Rpc("only legacy transactions are supported".to_string()));
        };
        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .map_err(|err| LedgerError::Rpc(format!("invalid signature: {err}")))?;
        let tx = signed.tx();
        if tx.chain_id != Some(CHAIN_ID) {
            return Err(LedgerError::Rpc(format!("wrong chain id {:?}", tx.chain_id)));
        }
        let TxKind::Call(to) = tx.to else {
            return Err(LedgerError::Rpc("contract creation is not supported".to_string()));
        };

        let mut submitted = SubmittedTx {
            tx_hash: *signed.hash(),
            from,
            to,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            value: tx.value,
            input: tx.input.clone(),
            success: false,
        };
        let mut state = self.state();
        state.execute(&mut submitted)?;
        state.submitted.push(submitted.clone());
        Ok(submitted.tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, LedgerError> {
        let state = self.state();
        if state.withhold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).copied())
    }
}
