//! Monetary rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places money is carried to.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to cents using round-half-up.
///
/// ```
/// use payroll_engine::calculation::round_money;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_money(Decimal::from_str("10.005").unwrap()), Decimal::from_str("10.01").unwrap());
/// assert_eq!(round_money(Decimal::from_str("10.004").unwrap()), Decimal::from_str("10.00").unwrap());
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `base * percentage / 100`, rounded to cents.
pub fn percentage_of(base: Decimal, percentage: Decimal) -> Decimal {
    round_money(base * percentage / Decimal::ONE_HUNDRED)
}
