//! Payroll period model and its status transition table.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Payroll, PayrollStatus};
use crate::error::ErrorKind;

/// Lifecycle status of a payroll period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Created, never processed (or reopened for correction).
    Draft,
    /// A processing run is in flight or was interrupted.
    Processing,
    /// All employees processed; awaiting approval.
    PendingApproval,
    /// Approved for payment.
    Approved,
    /// Payments made.
    Paid,
    /// Immutable.
    Locked,
}

impl PeriodStatus {
    /// Returns the snake_case name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Draft => "draft",
            PeriodStatus::Processing => "processing",
            PeriodStatus::PendingApproval => "pending_approval",
            PeriodStatus::Approved => "approved",
            PeriodStatus::Paid => "paid",
            PeriodStatus::Locked => "locked",
        }
    }

    /// Returns true if `process` may run in this status.
    pub fn allows_processing(&self) -> bool {
        matches!(self, PeriodStatus::Draft | PeriodStatus::Processing)
    }

    /// Returns true if `lock` may run in this status.
    pub fn allows_locking(&self) -> bool {
        matches!(self, PeriodStatus::Approved | PeriodStatus::Paid)
    }

    /// Returns true if the period holds calculated payroll that has not been
    /// approved yet. Draft periods never hold payroll rows, since reopening
    /// clears them.
    pub fn has_unsettled_payroll(&self) -> bool {
        matches!(self, PeriodStatus::Processing | PeriodStatus::PendingApproval)
    }

    /// Checks whether `self -> next` is an edge of the state machine.
    ///
    /// ```
    /// use payroll_engine::models::PeriodStatus;
    ///
    /// assert!(PeriodStatus::Draft.can_transition_to(PeriodStatus::Processing));
    /// assert!(PeriodStatus::Approved.can_transition_to(PeriodStatus::Paid));
    /// assert!(!PeriodStatus::Locked.can_transition_to(PeriodStatus::Draft));
    /// assert!(!PeriodStatus::Draft.can_transition_to(PeriodStatus::Approved));
    /// ```
    pub fn can_transition_to(&self, next: PeriodStatus) -> bool {
        use PeriodStatus::*;
        matches!(
            (self, next),
            (Draft, Processing)
                | (Processing, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Draft)
                | (Approved, Paid)
                | (Approved, Locked)
                | (Paid, Locked)
        )
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached aggregate totals of a period.
///
/// Always derivable from the period's payroll rows; failed rows are excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    /// Number of successfully calculated employees.
    pub employee_count: u32,
    /// Sum of gross pay.
    pub total_gross: Decimal,
    /// Sum of total deductions.
    pub total_deductions: Decimal,
    /// Sum of net pay.
    pub total_net: Decimal,
}

impl PeriodTotals {
    /// Recomputes totals from payroll rows, skipping failed rows.
    pub fn from_payrolls<'a>(payrolls: impl IntoIterator<Item = &'a Payroll>) -> Self {
        payrolls
            .into_iter()
            .filter(|p| p.status != PayrollStatus::Failed)
            .fold(Self::default(), |mut acc, p| {
                acc.employee_count += 1;
                acc.total_gross += p.gross_pay;
                acc.total_deductions += p.total_deductions;
                acc.total_net += p.net_pay;
                acc
            })
    }
}

/// A single employee that failed during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFailure {
    /// The employee.
    pub employee_id: Uuid,
    /// Human-readable reason.
    pub reason: String,
    /// Taxonomy bucket of the failure.
    pub kind: ErrorKind,
}

/// Outcome of the most recent processing run of a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Employees selected for processing.
    pub total_employees: u32,
    /// Employees with a calculated payroll.
    pub succeeded: u32,
    /// Employees whose payroll failed.
    pub failed: u32,
    /// Why each failed employee failed.
    pub failures: Vec<EmployeeFailure>,
    /// Number of warnings attached to calculated payrolls.
    pub warnings: u32,
}

/// A tenant-scoped payroll period covering `[start_date, end_date]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollPeriod {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Display name (e.g., "January 2025").
    pub name: String,
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
    /// Date employees are paid.
    pub pay_date: NaiveDate,
    /// Lifecycle status.
    pub status: PeriodStatus,
    /// Cached totals; never the source of truth.
    #[serde(default)]
    pub totals: PeriodTotals,
    /// Summary of the last processing run.
    #[serde(default)]
    pub last_run: Option<ProcessingSummary>,
    /// When the period was created.
    pub created_at: DateTime<Utc>,
}

impl PayrollPeriod {
    /// Returns true if the period's range shares a day with `[start, end]`.
    pub fn overlaps_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    /// Checks if a given date falls within this period (inclusive).
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
