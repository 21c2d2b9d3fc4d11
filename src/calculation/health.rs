//! Tiered health fund contribution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{HealthTier, MISSING_STATUTORY_CONFIG, PayrollWarning};

/// The result of a health contribution lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResult {
    /// Contribution withheld.
    pub amount: Decimal,
    /// The tier that supplied the amount.
    pub tier: Option<HealthTier>,
    /// True when no tier matched and the highest tier was used.
    pub fell_back: bool,
    /// Set when no tiers were configured.
    pub warning: Option<PayrollWarning>,
}

impl HealthResult {
    /// Audit payload for the health payroll item.
    pub fn detail(&self, gross_pay: Decimal) -> serde_json::Value {
        serde_json::json!({
            "gross_pay": gross_pay.to_string(),
            "tier": self.tier,
            "fell_back_to_highest_tier": self.fell_back,
        })
    }
}

/// Looks up the fixed contribution for `gross_pay`.
///
/// The first tier with `min <= gross_pay <= max` wins (`max = None` is
/// unbounded). When nothing matches, the highest tier is used: the
/// open-ended one if present, otherwise the one with the largest `min`.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::compute_health_contribution;
/// use payroll_engine::models::HealthTier;
/// use rust_decimal::Decimal;
///
/// let tiers = vec![
///     HealthTier { min: Decimal::ZERO, max: Some(Decimal::from(5_999)), amount: Decimal::from(150) },
///     HealthTier { min: Decimal::from(6_000), max: Some(Decimal::from(7_999)), amount: Decimal::from(300) },
/// ];
/// assert_eq!(compute_health_contribution(Decimal::from(6_000), &tiers).amount, Decimal::from(300));
/// assert_eq!(compute_health_contribution(Decimal::from(45_000), &tiers).amount, Decimal::from(300));
/// ```
pub fn compute_health_contribution(gross_pay: Decimal, tiers: &[HealthTier]) -> HealthResult {
    if let Some(tier) = tiers.iter().find(|tier| tier.contains(gross_pay)) {
        return HealthResult {
            amount: tier.amount,
            tier: Some(tier.clone()),
            fell_back: false,
            warning: None,
        };
    }

    let highest = tiers
        .iter()
        .find(|tier| tier.max.is_none())
        .or_else(|| tiers.iter().max_by(|a, b| a.min.cmp(&b.min)));

    match highest {
        Some(tier) => HealthResult {
            amount: tier.amount,
            tier: Some(tier.clone()),
            fell_back: true,
            warning: None,
        },
        None => {
            warn!(gross_pay = %gross_pay, "No health tiers configured; contribution set to zero");
            HealthResult {
                amount: Decimal::ZERO,
                tier: None,
                fell_back: false,
                warning: Some(PayrollWarning::new(
                    MISSING_STATUTORY_CONFIG,
                    "No health contribution tiers configured",
                )),
            }
        }
    }
}
