//! Capped pension fund contribution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::percentage_of;

/// The result of a pension contribution calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PensionResult {
    /// Contribution withheld, rounded to cents.
    pub amount: Decimal,
    /// Pay the rate was applied to (`min(gross_pay, cap_amount)`).
    pub pensionable_pay: Decimal,
    /// Rate as a percentage.
    pub rate: Decimal,
    /// True when the cap limited the pensionable pay.
    pub capped: bool,
}

impl PensionResult {
    /// Audit payload for the pension payroll item.
    pub fn detail(&self, gross_pay: Decimal, cap_amount: Decimal) -> serde_json::Value {
        serde_json::json!({
            "gross_pay": gross_pay.to_string(),
            "cap_amount": cap_amount.to_string(),
            "pensionable_pay": self.pensionable_pay.to_string(),
            "rate": self.rate.to_string(),
            "capped": self.capped,
        })
    }
}

/// Computes `min(gross_pay, cap_amount) * rate / 100`, rounded to cents.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::compute_pension_contribution;
/// use rust_decimal::Decimal;
///
/// let result = compute_pension_contribution(
///     Decimal::from(30_000),
///     Decimal::from(6),
///     Decimal::from(18_000),
/// );
/// assert_eq!(result.amount, Decimal::from(1_080));
/// assert!(result.capped);
/// ```
pub fn compute_pension_contribution(
    gross_pay: Decimal,
    rate: Decimal,
    cap_amount: Decimal,
) -> PensionResult {
    let gross_pay = gross_pay.max(Decimal::ZERO);
    let capped = gross_pay > cap_amount;
    let pensionable_pay = gross_pay.min(cap_amount);

    PensionResult {
        amount: percentage_of(pensionable_pay, rate),
        pensionable_pay,
        rate,
        capped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_cap_applies() {
        let result = compute_pension_contribution(dec("30000"), dec("6"), dec("18000"));
        assert_eq!(result.amount, dec("1080"));
        assert_eq!(result.pensionable_pay, dec("18000"));
        assert!(result.capped);
    }

    #[test]
    fn test_below_cap_uses_gross() {
        let result = compute_pension_contribution(dec("12345.67"), dec("6"), dec("36000"));
        // 12345.67 * 6% = 740.7402
        assert_eq!(result.amount, dec("740.74"));
        assert!(!result.capped);
    }

    #[test]
    fn test_gross_equal_to_cap_is_not_capped() {
        let result = compute_pension_contribution(dec("36000"), dec("6"), dec("36000"));
        assert_eq!(result.amount, dec("2160"));
        assert!(!result.capped);
    }

    #[test]
    fn test_zero_gross() {
        let result = compute_pension_contribution(Decimal::ZERO, dec("6"), dec("36000"));
        assert_eq!(result.amount, Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn prop_contribution_never_exceeds_capped_amount(cents in 0i64..100_000_000) {
            let gross = Decimal::new(cents, 2);
            let result = compute_pension_contribution(gross, dec("6"), dec("36000"));
            prop_assert!(result.amount <= dec("2160"));
            prop_assert!(result.amount >= Decimal::ZERO);
        }
    }
}
