//! Loan installments taken from a payroll run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::EmployeeLoan;

/// An installment planned against one loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDeduction {
    /// The loan.
    pub loan_id: Uuid,
    /// Installment, `min(monthly_deduction, remaining_balance)`.
    pub amount: Decimal,
    /// Balance the plan was made against.
    pub balance_before: Decimal,
}

impl LoanDeduction {
    /// Balance once the installment is booked.
    pub fn balance_after(&self) -> Decimal {
        self.balance_before - self.amount
    }
}

/// Plans the installments due on `pay_date`, ordered by loan id.
///
/// Loans that are not active, not yet started or already repaid contribute
/// nothing.
pub fn plan_loan_deductions(loans: &[EmployeeLoan], pay_date: NaiveDate) -> Vec<LoanDeduction> {
    let mut plan: Vec<LoanDeduction> = loans
        .iter()
        .filter_map(|loan| {
            let amount = loan.installment_due(pay_date);
            (amount > Decimal::ZERO).then_some(LoanDeduction {
                loan_id: loan.id,
                amount,
                balance_before: loan.remaining_balance,
            })
        })
        .collect();
    plan.sort_by_key(|d| d.loan_id);
    plan
}
