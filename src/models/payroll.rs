//! Payroll rows and their line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ComponentCategory, ComponentKind};

/// Warning code: a statutory rate could not be resolved.
pub const MISSING_STATUTORY_CONFIG: &str = "MISSING_STATUTORY_CONFIG";
/// Warning code: a percentage component's base was not assigned.
pub const MISSING_BASE_COMPONENT: &str = "MISSING_BASE_COMPONENT";
/// Warning code: an assignment referenced an unknown or inactive component.
pub const UNKNOWN_COMPONENT: &str = "UNKNOWN_COMPONENT";

/// Status of an individual payroll row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    /// Calculated by a processing run.
    Calculated,
    /// Approved with its period.
    Approved,
    /// Paid out.
    Paid,
    /// Could not be calculated; excluded from totals.
    Failed,
}

/// How net pay is disbursed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer.
    BankTransfer,
    /// Mobile money (e.g., M-Pesa).
    MobileMoney,
    /// Cheque.
    Cheque,
    /// Cash.
    Cash,
}

/// Payment details stamped on payrolls when a period is marked paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Disbursement channel.
    pub method: PaymentMethod,
    /// Batch or transaction reference.
    pub reference: String,
}

/// A non-fatal issue found while calculating a payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
}

impl PayrollWarning {
    /// Creates a new warning.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// One employee's payroll for one period.
///
/// `net_pay = total_earnings - total_deductions` and
/// `total_deductions = paye + pension + health + loan_deductions + other_deductions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payroll {
    /// Unique identifier, derived from (period, employee).
    pub id: Uuid,
    /// The period.
    pub period_id: Uuid,
    /// The employee.
    pub employee_id: Uuid,
    /// Sum of all earnings.
    pub gross_pay: Decimal,
    /// Sum of all earning lines (equal to gross pay).
    pub total_earnings: Decimal,
    /// Sum of taxable earnings.
    pub taxable_income: Decimal,
    /// Statutory, loan and other deductions.
    pub total_deductions: Decimal,
    /// Take-home pay.
    pub net_pay: Decimal,
    /// PAYE withheld.
    pub paye: Decimal,
    /// Pension contribution withheld.
    pub pension: Decimal,
    /// Health contribution withheld.
    pub health: Decimal,
    /// Loan installments withheld.
    pub loan_deductions: Decimal,
    /// Non-statutory deduction components.
    pub other_deductions: Decimal,
    /// Row status.
    pub status: PayrollStatus,
    /// Why the row failed, if it did.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Configuration gaps found during calculation.
    #[serde(default)]
    pub warnings: Vec<PayrollWarning>,
    /// Disbursement channel, set when paid.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Disbursement reference, set when paid.
    #[serde(default)]
    pub payment_reference: Option<String>,
}

impl Payroll {
    /// A zeroed row recording why an employee could not be paid.
    pub fn failed(
        id: Uuid,
        period_id: Uuid,
        employee_id: Uuid,
        reason: impl Into<String>,
        warnings: Vec<PayrollWarning>,
    ) -> Self {
        Self {
            id,
            period_id,
            employee_id,
            gross_pay: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            taxable_income: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            net_pay: Decimal::ZERO,
            paye: Decimal::ZERO,
            pension: Decimal::ZERO,
            health: Decimal::ZERO,
            loan_deductions: Decimal::ZERO,
            other_deductions: Decimal::ZERO,
            status: PayrollStatus::Failed,
            failure_reason: Some(reason.into()),
            warnings,
            payment_method: None,
            payment_reference: None,
        }
    }

    /// Sum of PAYE, pension and health.
    pub fn statutory_deductions(&self) -> Decimal {
        self.paye + self.pension + self.health
    }

    /// Returns true if the row's arithmetic invariants hold.
    pub fn is_consistent(&self) -> bool {
        self.net_pay == self.total_earnings - self.total_deductions
            && self.total_deductions
                == self.statutory_deductions() + self.loan_deductions + self.other_deductions
            && self.total_deductions >= self.statutory_deductions()
    }
}

/// A single earning or deduction line feeding a [`Payroll`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollItem {
    /// Unique identifier, derived from (payroll, line index).
    pub id: Uuid,
    /// The payroll the line belongs to.
    pub payroll_id: Uuid,
    /// Originating component; `None` for engine-generated lines.
    #[serde(default)]
    pub component_id: Option<Uuid>,
    /// Display name of the line.
    pub name: String,
    /// Earning or deduction.
    pub kind: ComponentKind,
    /// Reporting category.
    pub category: ComponentCategory,
    /// Line amount, always non-negative.
    pub amount: Decimal,
    /// Whether the line counted toward taxable income.
    pub is_taxable: bool,
    /// How the amount was derived (bracket breakdown, tier, percentage base).
    pub calculation_detail: serde_json::Value,
}
