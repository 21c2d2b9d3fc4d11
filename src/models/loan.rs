//! Employee loan and repayment ledger rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Requested, not yet approved.
    Pending,
    /// Approved and being repaid.
    Active,
    /// Fully repaid.
    Completed,
    /// Written off by an administrator.
    WrittenOff,
}

/// How a repayment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentType {
    /// Deducted from a payroll run.
    PayrollDeduction,
    /// Paid directly by the employee.
    Manual,
}

/// An employee loan repaid through payroll.
///
/// `remaining_balance = total_amount - total_paid` holds at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeLoan {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// The borrower.
    pub employee_id: Uuid,
    /// Amount lent.
    pub principal: Decimal,
    /// Flat interest rate as a percentage of principal.
    pub interest_rate: Decimal,
    /// `principal * (1 + interest_rate / 100)`, rounded to cents.
    pub total_amount: Decimal,
    /// Fixed installment deducted each pay period.
    pub monthly_deduction: Decimal,
    /// Amount still owed.
    pub remaining_balance: Decimal,
    /// Amount repaid so far.
    pub total_paid: Decimal,
    /// Lifecycle state.
    pub status: LoanStatus,
    /// First pay date an installment may be deducted on.
    #[serde(default)]
    pub repayment_start_date: Option<NaiveDate>,
    /// Free-text purpose.
    #[serde(default)]
    pub purpose: Option<String>,
    /// Reason recorded when the loan was written off.
    #[serde(default)]
    pub write_off_reason: Option<String>,
}

impl EmployeeLoan {
    /// Returns true if an installment should be taken on `pay_date`.
    pub fn is_deductible_on(&self, pay_date: NaiveDate) -> bool {
        self.status == LoanStatus::Active
            && self.remaining_balance > Decimal::ZERO
            && self.repayment_start_date.is_some_and(|start| start <= pay_date)
    }

    /// The installment due on `pay_date`, never more than what is owed.
    ///
    /// ```
    /// use payroll_engine::models::{EmployeeLoan, LoanStatus};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    /// use uuid::Uuid;
    ///
    /// let loan = EmployeeLoan {
    ///     id: Uuid::new_v4(),
    ///     tenant_id: Uuid::new_v4(),
    ///     employee_id: Uuid::new_v4(),
    ///     principal: Decimal::from(10_000),
    ///     interest_rate: Decimal::ZERO,
    ///     total_amount: Decimal::from(10_000),
    ///     monthly_deduction: Decimal::from(3_000),
    ///     remaining_balance: Decimal::from(1_000),
    ///     total_paid: Decimal::from(9_000),
    ///     status: LoanStatus::Active,
    ///     repayment_start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
    ///     purpose: None,
    ///     write_off_reason: None,
    /// };
    /// let pay_date = NaiveDate::from_ymd_opt(2025, 4, 28).unwrap();
    /// assert_eq!(loan.installment_due(pay_date), Decimal::from(1_000));
    /// ```
    pub fn installment_due(&self, pay_date: NaiveDate) -> Decimal {
        if self.is_deductible_on(pay_date) {
            self.monthly_deduction.min(self.remaining_balance)
        } else {
            Decimal::ZERO
        }
    }

    /// Returns true if the balance invariant holds.
    pub fn is_balanced(&self) -> bool {
        self.remaining_balance >= Decimal::ZERO
            && self.total_paid >= Decimal::ZERO
            && self.remaining_balance == self.total_amount - self.total_paid
    }
}

/// An immutable repayment ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRepayment {
    /// Unique identifier.
    pub id: Uuid,
    /// The loan repaid.
    pub loan_id: Uuid,
    /// Amount repaid.
    pub amount: Decimal,
    /// Date of the repayment (pay date for payroll deductions).
    pub repayment_date: NaiveDate,
    /// Payroll deduction or manual.
    pub repayment_type: RepaymentType,
    /// Remaining balance right after this repayment.
    pub balance_after: Decimal,
    /// The payroll that generated this repayment, if any.
    #[serde(default)]
    pub payroll_id: Option<Uuid>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}
