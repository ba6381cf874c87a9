mod transfer;

use alloy::primitives::{Address, Bytes, TxHash, U256};
pub use transfer::*;

/// ID of custodial sub-wallet in the wallet repository.
pub type SubWalletId = u64;

/// ID of the currency deposits are credited in.
pub type CurrencyId = u32;

/// Custodial sub-wallet, as stored by the wallet repository.
///
/// Key material is opaque to the sweeper and only ever handed to a
/// [`crate::keys::KeyDecryptor`].
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Wallet {
    pub id: SubWalletId,
    pub address: Address,
    #[debug(skip)]
    pub encrypted_key: String,
    #[debug(skip)]
    pub key_material: String,
    #[debug(skip)]
    pub salt: String,
}

/// Block with full transaction bodies, as returned by the ledger.
#[derive(Clone, Debug, Default)]
pub struct LedgerBlock {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<LedgerTransaction>,
}

/// The part of a transaction the scanner looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub input: Bytes,
}

/// Outcome of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl Receipt {
    /// Total fee paid, in wei.
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Display form of an address used in logs and by the wallet repository:
/// lower-cased hex with `0x` prefix.
pub fn normalized(address: &Address) -> String { format!("0x{address:x}") }
