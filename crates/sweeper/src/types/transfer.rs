use alloy::primitives::{Address, TxHash, U256};
use fastnum::UD128;

/// Token transfer call found in a scanned block, addressed to a watched
/// address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateTransfer {
    /// Hash of the transaction carrying the transfer call.
    pub tx_hash: TxHash,

    /// Sender of the transaction.
    pub sender: Address,

    /// Recipient decoded from calldata.
    pub destination: Address,

    /// Raw amount decoded from calldata.
    ///
    /// Informational only, crediting uses the live token balance.
    pub raw_amount: U256,
}

/// Native-currency top-up of a sub-wallet from the core wallet, so it can pay
/// for the sweep transfer.
#[derive(Clone, Copy, derive_more::Debug, PartialEq, Eq)]
pub struct GasFundingRequest {
    /// Core wallet address.
    pub from: Address,

    /// Sub-wallet to fund.
    pub to: Address,

    /// Amount to send, in wei.
    #[debug("{amount}")]
    pub amount: U256,
}

/// Deposit bookkeeping entry handed to the deposit repository.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct DepositRecord {
    pub sub_wallet_id: super::SubWalletId,

    pub currency_id: super::CurrencyId,

    /// Credited amount (normalized decimal, in token units).
    #[debug("{amount}")]
    pub amount: UD128,

    /// Deposit fee (normalized decimal, in token units).
    #[debug("{fee}")]
    pub fee: UD128,

    /// Hash of the transaction that triggered the deposit.
    pub tx_hash: TxHash,
}

/// Confirmed outbound transfer.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct TransferResult {
    pub tx_hash: TxHash,

    pub from: Address,

    pub to: Address,

    /// Transferred amount (normalized decimal).
    #[debug("{amount}")]
    pub amount: UD128,

    /// Fee paid for the transfer, in wei.
    #[debug("{gas_cost}")]
    pub gas_cost: U256,

    /// Time the receipt was observed.
    pub confirmed_at: chrono::DateTime<chrono::Utc>,
}
