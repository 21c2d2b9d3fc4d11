//! Progressive PAYE income tax.
//!
//! ## Bracket walk
//!
//! Brackets are walked in ascending `min` order. Bounded brackets are
//! contiguous bands: each one starts where the previous bracket's `max`
//! ended, so `[24001, 32333]` following `[0, 24000]` taxes the next 8,333.
//! The first bracket and the open-ended top bracket (`max = None`) start at
//! their own `min`. Relief is subtracted once from the accumulated tax, the
//! result is floored at zero and rounded half-up to cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::round_money;
use crate::models::{MISSING_STATUTORY_CONFIG, PayrollWarning, TaxBracket};

/// The slice of income taxed inside one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPortion {
    /// Configured lower bound.
    pub min: Decimal,
    /// Configured upper bound.
    pub max: Option<Decimal>,
    /// Rate as a percentage.
    pub rate: Decimal,
    /// Income taxed in this bracket.
    pub taxable_amount: Decimal,
    /// Tax on `taxable_amount`.
    pub tax: Decimal,
}

/// The result of a PAYE calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeResult {
    /// PAYE payable, after relief, rounded to cents.
    pub amount: Decimal,
    /// Tax before relief.
    pub gross_tax: Decimal,
    /// Relief actually used (never more than `gross_tax`).
    pub relief_applied: Decimal,
    /// Per-bracket breakdown.
    pub portions: Vec<BracketPortion>,
    /// Set when no brackets were configured.
    pub warning: Option<PayrollWarning>,
}

impl PayeResult {
    /// Audit payload for the PAYE payroll item.
    pub fn detail(&self, taxable_income: Decimal) -> serde_json::Value {
        serde_json::json!({
            "taxable_income": taxable_income.to_string(),
            "gross_tax": self.gross_tax.to_string(),
            "relief": self.relief_applied.to_string(),
            "brackets": self.portions,
        })
    }
}

/// Computes PAYE on `taxable_income`.
///
/// Never fails: with no brackets configured it returns zero and a
/// [`MISSING_STATUTORY_CONFIG`] warning.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::compute_paye;
/// use payroll_engine::models::TaxBracket;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let dec = |s: &str| Decimal::from_str(s).unwrap();
/// let brackets = vec![
///     TaxBracket { min: dec("0"), max: Some(dec("24000")), rate: dec("10") },
///     TaxBracket { min: dec("24001"), max: Some(dec("32333")), rate: dec("25") },
///     TaxBracket { min: dec("32334"), max: None, rate: dec("30") },
/// ];
///
/// let result = compute_paye(dec("50000"), &brackets, dec("2400"));
/// assert_eq!(result.amount, dec("7383.05"));
/// ```
pub fn compute_paye(taxable_income: Decimal, brackets: &[TaxBracket], relief: Decimal) -> PayeResult {
    if brackets.is_empty() {
        warn!(taxable_income = %taxable_income, "No PAYE brackets configured; PAYE set to zero");
        return PayeResult {
            amount: Decimal::ZERO,
            gross_tax: Decimal::ZERO,
            relief_applied: Decimal::ZERO,
            portions: Vec::new(),
            warning: Some(PayrollWarning::new(
                MISSING_STATUTORY_CONFIG,
                "No PAYE brackets configured",
            )),
        };
    }

    let mut sorted: Vec<&TaxBracket> = brackets.iter().collect();
    sorted.sort_by(|a, b| a.min.cmp(&b.min));

    let mut portions = Vec::new();
    let mut gross_tax = Decimal::ZERO;
    let mut previous_ceiling: Option<Decimal> = None;

    for bracket in sorted {
        let floor = match (bracket.max, previous_ceiling) {
            (Some(_), Some(ceiling)) => ceiling,
            _ => bracket.min,
        };
        previous_ceiling = bracket.max;

        if taxable_income <= floor {
            break;
        }

        let upper = bracket
            .max
            .map_or(taxable_income, |max| max.min(taxable_income));
        let taxable_amount = (upper - floor).max(Decimal::ZERO);
        if taxable_amount.is_zero() {
            continue;
        }

        let tax = taxable_amount * bracket.rate / Decimal::ONE_HUNDRED;
        gross_tax += tax;
        portions.push(BracketPortion {
            min: bracket.min,
            max: bracket.max,
            rate: bracket.rate,
            taxable_amount,
            tax,
        });
    }

    let relief_applied = relief.max(Decimal::ZERO).min(gross_tax);
    let amount = round_money((gross_tax - relief_applied).max(Decimal::ZERO));

    PayeResult {
        amount,
        gross_tax,
        relief_applied,
        portions,
        warning: None,
    }
}
