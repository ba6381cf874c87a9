//! Token transfer calldata decoding.
//!
//! Layout of `transfer(address,uint256)` calldata:
//!
//! | Bytes | Content |
//! | --- | --- |
//! | `0..4` | method selector |
//! | `4..36` | recipient, left-padded to 32 bytes |
//! | `36..68` | amount, big-endian |
//!
//! Anything after byte 68 is ignored.

use alloy::primitives::{Address, FixedBytes, U256};

/// Minimum length of a transfer call payload.
pub const TRANSFER_CALL_LEN: usize = 4 + 32 + 32;

/// Recipient and amount of a decoded transfer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferCall {
    pub to: Address,
    pub amount: U256,
}

/// Reason a payload is not treated as a transfer call.
///
/// These are expected outcomes for most calls to a token contract
/// (approvals, `transferFrom`, garbage), not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeSkip {
    #[error("payload is {0} bytes, shorter than a transfer call")]
    TooShort(usize),

    #[error("selector {0} is not the transfer selector")]
    SelectorMismatch(FixedBytes<4>),
}

/// Decodes a transfer call addressed with `selector`.
///
/// Pure and deterministic: upper 12 bytes of the address slot are ignored,
/// amount is read as a full 256-bit integer.
pub fn transfer_call(input: &[u8], selector: FixedBytes<4>) -> Result<TransferCall, DecodeSkip> {
    if input.len() < TRANSFER_CALL_LEN {
        return Err(DecodeSkip::TooShort(input.len()));
    }
    let actual = FixedBytes::<4>::from_slice(&input[..4]);
    if actual != selector {
        return Err(DecodeSkip::SelectorMismatch(actual));
    }
    Ok(TransferCall {
        to: Address::from_slice(&input[16..36]),
        amount: U256::from_be_slice(&input[36..68]),
    })
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{address, fixed_bytes},
        sol_types::SolCall,
    };

    use super::*;
    use crate::abi::{IERC20, TRANSFER_SELECTOR};

    fn payload(to: Address, amount: U256) -> Vec<u8> {
        IERC20::transferCall { to, amount }.abi_encode()
    }

    #[test]
    fn decodes_transfer() {
        let to = address!("0x55d398326f99059fF775485246999027B3197955");
        let input = payload(to, U256::from(50));
        assert_eq!(input.len(), TRANSFER_CALL_LEN);

        let call = transfer_call(&input, TRANSFER_SELECTOR).unwrap();
        assert_eq!(call, TransferCall { to, amount: U256::from(50) });
        assert_eq!(
            crate::types::normalized(&call.to),
            "0x55d398326f99059ff775485246999027b3197955"
        );
    }

    #[test]
    fn short_payloads_never_match() {
        let input = payload(Address::repeat_byte(0x11), U256::MAX);
        for len in 0..TRANSFER_CALL_LEN {
            assert_eq!(transfer_call(&input[..len], TRANSFER_SELECTOR), Err(DecodeSkip::TooShort(len)));
        }
    }

    #[test]
    fn other_selectors_never_match() {
        let mut input = payload(Address::repeat_byte(0x11), U256::from(1));
        // approve(address,uint256)
        input[..4].copy_from_slice(&[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(
            transfer_call(&input, TRANSFER_SELECTOR),
            Err(DecodeSkip::SelectorMismatch(fixed_bytes!("0x095ea7b3")))
        );

        let input = payload(Address::repeat_byte(0x11), U256::from(1));
        assert!(transfer_call(&input, fixed_bytes!("0xdeadbeef")).is_err());
    }

    #[test]
    fn address_is_low_twenty_bytes() {
        let mut input = payload(Address::repeat_byte(0xab), U256::from(7));
        // dirty padding is ignored
        input[4..16].fill(0xff);
        let call = transfer_call(&input, TRANSFER_SELECTOR).unwrap();
        assert_eq!(call.to, Address::repeat_byte(0xab));
        assert_eq!(call.amount, U256::from(7));
    }

    #[test]
    fn trailing_bytes_ignored_and_deterministic() {
        let mut input = payload(Address::repeat_byte(0x01), U256::MAX);
        input.extend_from_slice(&[0u8; 12]);
        let first = transfer_call(&input, TRANSFER_SELECTOR).unwrap();
        let second = transfer_call(&input, TRANSFER_SELECTOR).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.amount, U256::MAX);
    }
}
