//! Statutory remittance obligations emitted when a period locks.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RateType;
use crate::error::{EngineError, EngineResult};

/// An obligation to pay a statutory deduction total by a due date.
///
/// Unique per (period, tax type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remittance {
    /// The locked period.
    pub period_id: Uuid,
    /// The statutory deduction being remitted.
    pub tax_type: RateType,
    /// Total withheld across the period.
    pub amount: Decimal,
    /// Date the authority must be paid by.
    pub due_date: NaiveDate,
}

/// Returns `due_day` of the month following `period_end`, clamped to the
/// length of that month.
///
/// ```
/// use payroll_engine::models::remittance_due_date;
/// use chrono::NaiveDate;
///
/// let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
/// let due = |day| remittance_due_date(end, day).unwrap();
/// assert_eq!(due(9), NaiveDate::from_ymd_opt(2025, 2, 9).unwrap());
/// assert_eq!(due(31), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
/// ```
///
/// # Errors
///
/// [`EngineError::Validation`] if the calendar has no month after
/// `period_end`.
pub fn remittance_due_date(period_end: NaiveDate, due_day: u32) -> EngineResult<NaiveDate> {
    let out_of_range = || {
        EngineError::validation(format!("No remittance month follows {period_end}"))
    };
    let first = period_end
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(1)))
        .ok_or_else(out_of_range)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);

    let day = due_day.clamp(1, last.day());
    first.with_day(day).ok_or_else(out_of_range)
}
