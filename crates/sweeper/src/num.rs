//! Conversions between raw on-chain integers and normalized decimals.

use alloy::primitives::{U256, utils::format_units};
use fastnum::{U128, UD128, decimal::Context};

use crate::error::SweepError;

/// Converts raw fixed-point integers with the given number of decimals to
/// normalized decimals and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Converter {
    decimals: u8,
}

impl Converter {
    pub const fn new(decimals: u8) -> Self { Self { decimals } }

    pub fn decimals(&self) -> u8 { self.decimals }

    /// Raw integer to normalized decimal, with trailing fractional zeros
    /// dropped. Fails if the value doesn't fit the decimal's digits.
    pub fn from_unsigned(&self, value: U256) -> Result<UD128, SweepError> {
        let ten = U256::from(10);
        let (mut digits, mut exp) = (value, -i32::from(self.decimals));
        if digits.is_zero() {
            exp = 0;
        }
        while exp < 0 && (digits % ten).is_zero() {
            digits /= ten;
            exp += 1;
        }
        let digits = U128::from_str(&digits.to_string()).map_err(|_| {
            SweepError::InvalidAmount(format!("{value} exceeds the decimal range"))
        })?;
        Ok(UD128::from_parts(digits, exp, Context::default()))
    }

    /// Normalized decimal to raw integer. Fails on excess precision or
    /// overflow.
    pub fn to_unsigned(&self, value: UD128) -> Result<U256, SweepError> {
        let invalid = |reason: String| SweepError::InvalidAmount(format!("{value}: {reason}"));
        let overflow = || invalid("exceeds 256 bits".to_string());

        let digits: U256 = value.digits().to_string().parse().map_err(|_| overflow())?;
        let shift = i32::from(self.decimals) - i32::from(value.fractional_digits_count());
        let unit = U256::from(10)
            .checked_pow(U256::from(shift.unsigned_abs()))
            .ok_or_else(overflow)?;
        if shift >= 0 {
            digits.checked_mul(unit).ok_or_else(overflow)
        } else if (digits % unit).is_zero() {
            Ok(digits / unit)
        } else {
            Err(invalid(format!("more than {} decimals", self.decimals)))
        }
    }

    /// Raw integer in normalized units, for logs.
    pub fn format(&self, value: U256) -> String {
        match format_units(value, self.decimals) {
            Ok(s) => trim_fraction(&s).to_string(),
            Err(_) => value.to_string(),
        }
    }

    /// Rounds raw value half-up to `precision` decimal places, keeping it
    /// in raw units.
    pub fn round(&self, value: U256, precision: u8) -> U256 {
        if precision >= self.decimals {
            return value;
        }
        let unit = U256::from(10).pow(U256::from(self.decimals - precision));
        let half = unit / U256::from(2);
        (value.saturating_add(half) / unit) * unit
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.') } else { s }
}

#[cfg(test)]
mod tests {
    use fastnum::udec128;

    use super::*;

    #[test]
    fn from_unsigned() {
        let c = Converter::new(18);
        let fifty = U256::from(50) * U256::from(10).pow(U256::from(18));
        assert_eq!(c.from_unsigned(fifty).unwrap(), udec128!(50));
        assert_eq!(c.from_unsigned(fifty).unwrap().to_string(), "50");
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(c.from_unsigned(one_and_half).unwrap(), udec128!(1.5));
        assert_eq!(c.from_unsigned(U256::ZERO).unwrap(), udec128!(0));
        assert_eq!(c.from_unsigned(U256::from(1)).unwrap(), udec128!(0.000000000000000001));
    }

    #[test]
    fn from_unsigned_out_of_range() {
        let c = Converter::new(18);
        let huge = U256::from(10).pow(U256::from(40)) + U256::from(1);
        assert!(matches!(c.from_unsigned(huge), Err(SweepError::InvalidAmount(_))));
        assert!(c.from_unsigned(U256::MAX).is_err());
    }

    #[test]
    fn to_unsigned() {
        let c = Converter::new(6);
        assert_eq!(c.to_unsigned(udec128!(12.5)).unwrap(), U256::from(12_500_000));
        assert_eq!(c.to_unsigned(udec128!(0)).unwrap(), U256::ZERO);
        assert_eq!(c.to_unsigned(udec128!(12.500)).unwrap(), U256::from(12_500_000));
        assert!(c.to_unsigned(udec128!(0.0000001)).is_err());
    }

    #[test]
    fn to_unsigned_small_and_scaled_values() {
        let c = Converter::new(18);
        // printed in exponent form by Display
        assert_eq!(c.to_unsigned(udec128!(0.0000001)).unwrap(), U256::from(100_000_000_000u64));
        let expected = U256::from(5u64) * U256::from(10).pow(U256::from(27));
        assert_eq!(c.to_unsigned(udec128!(5e9)).unwrap(), expected);
    }

    #[test]
    fn converts_back_and_forth_at_full_precision() {
        let c = Converter::new(18);
        let raw = U256::from(123_456_789_000_000_000_001u128);
        assert_eq!(c.to_unsigned(c.from_unsigned(raw).unwrap()).unwrap(), raw);
    }

    #[test]
    fn formats_for_logs() {
        let c = Converter::new(18);
        assert_eq!(c.format(U256::from(1_500_000_000_000_000_000u128)), "1.5");
        assert_eq!(c.format(U256::from(10).pow(U256::from(40))), "10000000000000000000000");
    }

    #[test]
    fn round_half_up() {
        let c = Converter::new(18);
        // 60000 gas @ 3 gwei = 0.00018 BNB, already on an 8-decimal boundary
        let wei = U256::from(60_000u64 * 3_000_000_000u64);
        assert_eq!(c.round(wei, 8), wei);

        // 0.000000015 -> 0.00000002
        let wei = U256::from(15_000_000_000u64);
        assert_eq!(c.round(wei, 8), U256::from(20_000_000_000u64));

        // 0.0000000149 -> 0.00000001
        let wei = U256::from(14_900_000_000u64);
        assert_eq!(c.round(wei, 8), U256::from(10_000_000_000u64));

        assert_eq!(c.round(wei, 18), wei);
    }

    #[test]
    fn trims_fraction() {
        assert_eq!(trim_fraction("50.000"), "50");
        assert_eq!(trim_fraction("0.500"), "0.5");
        assert_eq!(trim_fraction("100"), "100");
    }
}
