//! Statutory deductions for one employee.
//!
//! Combines PAYE, pension and health using whichever rate rows were resolved
//! for the employee's country on the calculation date. A missing rate never
//! fails the calculation; it contributes zero and a warning.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{compute_health_contribution, compute_paye, compute_pension_contribution};
use crate::models::{
    HealthConfig, MISSING_STATUTORY_CONFIG, PayeConfig, PayrollWarning, PensionConfig, RateType,
};

/// The typed statutory configuration in force for one country on one date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStatutoryRates {
    /// Country the rates were resolved for.
    pub country: String,
    /// Calculation date.
    pub as_of: Option<NaiveDate>,
    /// PAYE configuration, if any.
    pub paye: Option<PayeConfig>,
    /// Pension configuration, if any.
    pub pension: Option<PensionConfig>,
    /// Health configuration, if any.
    pub health: Option<HealthConfig>,
}

/// One statutory deduction line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatutoryLine {
    /// Which deduction.
    pub rate_type: RateType,
    /// Amount withheld.
    pub amount: Decimal,
    /// Derivation for audit and payslips.
    pub detail: serde_json::Value,
}

/// All statutory deductions for one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatutoryDeductions {
    /// PAYE withheld.
    pub paye: Decimal,
    /// Pension contribution withheld.
    pub pension: Decimal,
    /// Health contribution withheld.
    pub health: Decimal,
    /// Non-zero lines in PAYE, pension, health order.
    pub lines: Vec<StatutoryLine>,
    /// Configuration gaps.
    pub warnings: Vec<PayrollWarning>,
}

impl StatutoryDeductions {
    /// Sum of all statutory deductions.
    pub fn total(&self) -> Decimal {
        self.paye + self.pension + self.health
    }
}

fn missing(rates: &ResolvedStatutoryRates, rate_type: RateType) -> PayrollWarning {
    let date = rates
        .as_of
        .map(|d| d.to_string())
        .unwrap_or_else(|| "the calculation date".to_string());
    PayrollWarning::new(
        MISSING_STATUTORY_CONFIG,
        format!(
            "No {} rate configured for country '{}' on {}",
            rate_type, rates.country, date
        ),
    )
}

/// Computes PAYE on `taxable_income` and pension/health on `gross_pay`.
pub fn compute_statutory_deductions(
    rates: &ResolvedStatutoryRates,
    taxable_income: Decimal,
    gross_pay: Decimal,
) -> StatutoryDeductions {
    let mut result = StatutoryDeductions::default();

    match &rates.paye {
        Some(config) => {
            let paye = compute_paye(taxable_income, &config.brackets, config.relief);
            result.paye = paye.amount;
            if let Some(warning) = paye.warning.clone() {
                result.warnings.push(warning);
            }
            if paye.amount > Decimal::ZERO {
                result.lines.push(StatutoryLine {
                    rate_type: RateType::Paye,
                    amount: paye.amount,
                    detail: paye.detail(taxable_income),
                });
            }
        }
        None => result.warnings.push(missing(rates, RateType::Paye)),
    }

    match &rates.pension {
        Some(config) => {
            let pension = compute_pension_contribution(gross_pay, config.rate, config.cap_amount);
            result.pension = pension.amount;
            if pension.amount > Decimal::ZERO {
                result.lines.push(StatutoryLine {
                    rate_type: RateType::Pension,
                    amount: pension.amount,
                    detail: pension.detail(gross_pay, config.cap_amount),
                });
            }
        }
        None => result.warnings.push(missing(rates, RateType::Pension)),
    }

    match &rates.health {
        Some(config) => {
            let health = compute_health_contribution(gross_pay, &config.tiers);
            result.health = health.amount;
            if let Some(warning) = health.warning.clone() {
                result.warnings.push(warning);
            }
            if health.amount > Decimal::ZERO {
                result.lines.push(StatutoryLine {
                    rate_type: RateType::Health,
                    amount: health.amount,
                    detail: health.detail(gross_pay),
                });
            }
        }
        None => result.warnings.push(missing(rates, RateType::Health)),
    }

    result
}
