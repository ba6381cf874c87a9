//! Recovery of sub-wallet signing keys from stored key material.

use std::str::FromStr;

use alloy::{primitives::B256, signers::local::PrivateKeySigner};

use crate::{error::DecryptError, types::Wallet};

/// Decrypts the private key of a custodial sub-wallet.
pub trait KeyDecryptor: Send + Sync {
    fn decrypt(
        &self,
        encrypted_key: &str,
        key_material: &str,
        salt: &str,
    ) -> Result<B256, DecryptError>;
}

/// Key "decryption" for development setups where the stored key is the plain
/// hex-encoded private key. Key material and salt are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaintextKeys;

impl KeyDecryptor for PlaintextKeys {
    fn decrypt(&self, encrypted_key: &str, _: &str, _: &str) -> Result<B256, DecryptError> {
        B256::from_str(encrypted_key.trim())
            .map_err(|err| DecryptError::Malformed(err.to_string()))
    }
}

/// Signer of the sub-wallet, checked to actually control the wallet address.
pub fn wallet_signer<K: KeyDecryptor + ?Sized>(
    keys: &K,
    wallet: &Wallet,
) -> Result<PrivateKeySigner, DecryptError> {
    let key = keys.decrypt(&wallet.encrypted_key, &wallet.key_material, &wallet.salt)?;
    let signer =
        PrivateKeySigner::from_bytes(&key).map_err(|err| DecryptError::Malformed(err.to_string()))?;
    if signer.address() != wallet.address {
        return Err(DecryptError::Mismatch(wallet.address));
    }
    Ok(signer)
}
