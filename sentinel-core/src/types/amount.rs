use std::str::FromStr;

use alloy_primitives::U256;
use anyhow::Error;
use rust_decimal::Decimal;

use super::{BalanceDelta, Direction, RawBalance};

/// Largest exponent a `Decimal` can carry as scale.
pub const MAX_DECIMALS: u32 = 28;

/// Parses a raw balance written as a base-10 integer string.
pub fn parse_raw_balance(value: &str) -> Result<RawBalance, Error> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::msg(format!("Invalid raw balance: {:?}", value)));
    }

    U256::from_str_radix(value, 10).map_err(|e| Error::msg(format!("{}: {:?}", e, value)))
}

/// Divides a raw balance by `10^decimals`.
///
/// Fractional digits beyond what a `Decimal` can hold are rounded away.
/// Returns `None` when the integer part itself does not fit.
pub fn scale_raw(value: RawBalance, decimals: u32) -> Option<Decimal> {
    if decimals > MAX_DECIMALS {
        return None;
    }

    let mut value_str = value.to_string();

    if decimals > 0 {
        let decimals = decimals as usize;
        if value_str.len() <= decimals {
            let padding = "0".repeat(decimals + 1 - value_str.len());
            value_str.insert_str(0, &padding);
        }
        value_str.insert(value_str.len() - decimals, '.');
    }

    Decimal::from_str(&value_str).ok()
}

/// Signed, scaled form of a delta.
pub fn scale_delta(delta: &BalanceDelta, decimals: u32) -> Option<Decimal> {
    let amount = scale_raw(delta.amount, decimals)?;
    Some(match delta.direction {
        Direction::Increase => amount,
        Direction::Decrease => -amount,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_raw_balance() {
        assert_eq!(
            parse_raw_balance("292000000").unwrap(),
            U256::from(292_000_000u64)
        );
        assert_eq!(parse_raw_balance(" 0 ").unwrap(), U256::ZERO);
        assert!(parse_raw_balance("").is_err());
        assert!(parse_raw_balance("-5").is_err());
        assert!(parse_raw_balance("0x10").is_err());
        assert!(parse_raw_balance("1.5").is_err());
    }

    #[test]
    fn test_scale_raw() {
        assert_eq!(scale_raw(U256::from(250u64), 0), Some(Decimal::from(250)));
        assert_eq!(
            scale_raw(U256::from(292_000_000u64), 9),
            Some(Decimal::from_str("0.292").unwrap())
        );
        assert_eq!(
            scale_raw(U256::from(2_467_772u64), 9),
            Some(Decimal::from_str("0.002467772").unwrap())
        );
        assert_eq!(
            scale_raw(U256::from(1_500_000_000u64), 9),
            Some(Decimal::from_str("1.5").unwrap())
        );
        assert_eq!(scale_raw(U256::ZERO, 9), Some(Decimal::ZERO));
    }

    #[test]
    fn test_scale_raw_rounds_excess_digits() {
        let raw = parse_raw_balance("100000000000000000000000000001").unwrap();
        let scaled = scale_raw(raw, 9).unwrap();
        assert!(scaled > Decimal::from(1_000_000));
        assert_eq!(
            scaled.trunc(),
            Decimal::from_str("100000000000000000000").unwrap()
        );

        let scaled = scale_raw(U256::from(u128::MAX), 18).unwrap();
        assert_eq!(
            scaled.trunc(),
            Decimal::from_str("340282366920938463463").unwrap()
        );
    }

    #[test]
    fn test_scale_raw_out_of_range() {
        assert_eq!(scale_raw(U256::from(1u64), MAX_DECIMALS + 1), None);
        assert_eq!(scale_raw(U256::from(u128::MAX), 9), None);
        assert_eq!(scale_raw(U256::MAX, 0), None);
    }

    #[test]
    fn test_scale_delta() {
        let increase = BalanceDelta {
            direction: Direction::Increase,
            amount: U256::from(50u64),
        };
        let decrease = BalanceDelta {
            direction: Direction::Decrease,
            amount: U256::from(50u64),
        };
        assert_eq!(scale_delta(&increase, 0), Some(Decimal::from(50)));
        assert_eq!(
            scale_delta(&decrease, 1),
            Some(Decimal::from_str("-5").unwrap())
        );

        let overflow = BalanceDelta {
            direction: Direction::Increase,
            amount: U256::MAX,
        };
        assert_eq!(scale_delta(&overflow, 0), None);
    }
}
