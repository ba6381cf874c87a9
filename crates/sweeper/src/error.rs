use alloy::{
    contract,
    transports::{RpcError, TransportError},
};

use crate::types::SubWalletId;

/// Failure reported by the [`crate::ledger::Ledger`] client.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LedgerError {
    /// Node is unreachable or the transport broke mid-request.
    #[error("node connectivity: {0}")]
    Connectivity(String),

    /// Node answered with an error or an undecodable response.
    #[error("node rpc: {0}")]
    Rpc(String),

    /// Requested data is not served by the node (yet).
    #[error("not available: {0}")]
    Unavailable(String),

    /// Local transaction signing failed.
    #[error("signing: {0}")]
    Signing(String),

    /// Receipt did not show up within the configured wait.
    #[error("timed out waiting for receipt of {0}")]
    Timeout(alloy::primitives::TxHash),
}

impl LedgerError {
    /// Connectivity failures get the long backoff in the scan loop.
    pub fn is_connectivity(&self) -> bool { matches!(self, Self::Connectivity(_)) }
}

impl From<TransportError> for LedgerError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::Transport(kind) => Self::Connectivity(kind.to_string()),
            other => Self::Rpc(other.to_string()),
        }
    }
}

impl From<contract::Error> for LedgerError {
    fn from(err: contract::Error) -> Self {
        match err {
            contract::Error::TransportError(err) => err.into(),
            other => Self::Rpc(other.to_string()),
        }
    }
}

/// Failure reported by wallet/deposit repositories.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage backend: {0}")]
    Backend(String),

    #[error("sub-wallet {0} does not exist")]
    UnknownWallet(SubWalletId),
}

/// Failure to recover a signing key from stored key material.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("malformed key material: {0}")]
    Malformed(String),

    #[error("key material does not match wallet {0}")]
    Mismatch(alloy::primitives::Address),
}

/// Reason a sweep was abandoned. None of these leave a repository mutation behind.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("no custodial wallet owns {0}")]
    UnknownWallet(alloy::primitives::Address),

    #[error("gas top-up for {address} failed: {source}")]
    GasFunding {
        address: alloy::primitives::Address,
        #[source]
        source: LedgerError,
    },

    #[error("gas top-up {0} reverted")]
    GasFundingReverted(alloy::primitives::TxHash),

    #[error("token transfer failed: {0}")]
    Transfer(#[source] LedgerError),

    #[error("token transfer {0} reverted")]
    TransferReverted(alloy::primitives::TxHash),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Invalid monitor configuration, detected before anything is started.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("core wallet address {configured} does not match its private key ({derived})")]
    CoreWalletMismatch {
        configured: alloy::primitives::Address,
        derived: alloy::primitives::Address,
    },
}
