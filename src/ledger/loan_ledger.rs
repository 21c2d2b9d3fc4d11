//! Loan ledger arithmetic.
//!
//! Each function takes the current loan row and returns the next one; none
//! of them touch storage. `remaining_balance = total_amount - total_paid` is
//! checked before and after every change.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculation::{percentage_of, round_money};
use crate::error::{EngineError, EngineResult};
use crate::models::{EmployeeLoan, LoanRepayment, LoanStatus, RepaymentType};

/// Request to open a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// The borrower.
    pub employee_id: Uuid,
    /// Amount lent.
    pub principal: Decimal,
    /// Flat interest rate as a percentage of principal.
    #[serde(default)]
    pub interest_rate: Decimal,
    /// Installment taken each pay period.
    pub monthly_deduction: Decimal,
    /// Free-text purpose.
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Opens a pending loan with its derived total.
///
/// ```
/// use payroll_engine::ledger::{NewLoan, create_loan};
/// use payroll_engine::models::LoanStatus;
/// use rust_decimal::Decimal;
/// use uuid::Uuid;
///
/// let loan = create_loan(Uuid::new_v4(), NewLoan {
///     tenant_id: Uuid::new_v4(),
///     employee_id: Uuid::new_v4(),
///     principal: Decimal::from(10_000),
///     interest_rate: Decimal::from(5),
///     monthly_deduction: Decimal::from(1_000),
///     purpose: None,
/// })?;
/// assert_eq!(loan.total_amount, Decimal::from(10_500));
/// assert_eq!(loan.remaining_balance, loan.total_amount);
/// assert_eq!(loan.status, LoanStatus::Pending);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub fn create_loan(id: Uuid, request: NewLoan) -> EngineResult<EmployeeLoan> {
    if request.principal <= Decimal::ZERO {
        return Err(EngineError::validation("Loan principal must be positive"));
    }
    if request.interest_rate < Decimal::ZERO {
        return Err(EngineError::validation("Loan interest rate must not be negative"));
    }
    if request.monthly_deduction <= Decimal::ZERO {
        return Err(EngineError::validation("Monthly deduction must be positive"));
    }

    let principal = round_money(request.principal);
    let total_amount = principal + percentage_of(principal, request.interest_rate);

    Ok(EmployeeLoan {
        id,
        tenant_id: request.tenant_id,
        employee_id: request.employee_id,
        principal,
        interest_rate: request.interest_rate,
        total_amount,
        monthly_deduction: round_money(request.monthly_deduction),
        remaining_balance: total_amount,
        total_paid: Decimal::ZERO,
        status: LoanStatus::Pending,
        repayment_start_date: None,
        purpose: request.purpose,
        write_off_reason: None,
    })
}

/// Activates a pending loan from `repayment_start_date`.
pub fn approve_loan(loan: &EmployeeLoan, repayment_start_date: NaiveDate) -> EngineResult<EmployeeLoan> {
    if loan.status != LoanStatus::Pending {
        return Err(EngineError::validation(format!(
            "Loan {} cannot be approved from status {:?}",
            loan.id, loan.status
        )));
    }
    Ok(EmployeeLoan {
        status: LoanStatus::Active,
        repayment_start_date: Some(repayment_start_date),
        ..loan.clone()
    })
}

/// Writes off an active loan. The reason is mandatory.
pub fn write_off_loan(loan: &EmployeeLoan, reason: &str) -> EngineResult<EmployeeLoan> {
    if reason.trim().is_empty() {
        return Err(EngineError::validation("A write-off reason is required"));
    }
    if loan.status != LoanStatus::Active {
        return Err(EngineError::validation(format!(
            "Only active loans can be written off; loan {} is {:?}",
            loan.id, loan.status
        )));
    }
    Ok(EmployeeLoan {
        status: LoanStatus::WrittenOff,
        write_off_reason: Some(reason.trim().to_string()),
        ..loan.clone()
    })
}

/// A repayment to book against a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepaymentRequest {
    /// Id of the repayment row to create.
    pub repayment_id: Uuid,
    /// Amount repaid.
    pub amount: Decimal,
    /// Repayment date.
    pub date: NaiveDate,
    /// Payroll deduction or manual.
    pub repayment_type: RepaymentType,
    /// Generating payroll, if any.
    pub payroll_id: Option<Uuid>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// Books a repayment, completing the loan when the balance reaches zero.
///
/// # Errors
///
/// [`EngineError::LedgerInconsistency`] if the loan is not active, its
/// balance invariant is already broken, or `amount` exceeds what is owed.
pub fn book_repayment(
    loan: &EmployeeLoan,
    request: RepaymentRequest,
) -> EngineResult<(EmployeeLoan, LoanRepayment)> {
    if loan.status != LoanStatus::Active {
        return Err(EngineError::ledger(
            loan.id,
            format!("cannot repay a loan in status {:?}", loan.status),
        ));
    }
    if !loan.is_balanced() {
        return Err(EngineError::ledger(
            loan.id,
            "remaining balance does not equal total minus paid",
        ));
    }
    if request.amount <= Decimal::ZERO {
        return Err(EngineError::ledger(loan.id, "repayment amount must be positive"));
    }
    if request.amount > loan.remaining_balance {
        return Err(EngineError::ledger(
            loan.id,
            format!(
                "repayment {} exceeds remaining balance {}",
                request.amount, loan.remaining_balance
            ),
        ));
    }

    let remaining_balance = loan.remaining_balance - request.amount;
    let updated = EmployeeLoan {
        remaining_balance,
        total_paid: loan.total_paid + request.amount,
        status: if remaining_balance.is_zero() {
            LoanStatus::Completed
        } else {
            LoanStatus::Active
        },
        ..loan.clone()
    };

    let repayment = LoanRepayment {
        id: request.repayment_id,
        loan_id: loan.id,
        amount: request.amount,
        repayment_date: request.date,
        repayment_type: request.repayment_type,
        balance_after: remaining_balance,
        payroll_id: request.payroll_id,
        notes: request.notes,
    };

    Ok((updated, repayment))
}

/// Undoes a repayment by owing its amount again.
///
/// Later repayments are unaffected, so a payroll deduction can be reversed
/// after a manual repayment landed on the same loan. A completed loan
/// returns to active; a written-off loan stays written off.
///
/// # Errors
///
/// [`EngineError::LedgerInconsistency`] if the repayment belongs to another
/// loan, the loan's balance invariant is already broken, or the loan has not
/// been paid enough for the reversal.
pub fn reverse_repayment(loan: &EmployeeLoan, repayment: &LoanRepayment) -> EngineResult<EmployeeLoan> {
    if repayment.loan_id != loan.id {
        return Err(EngineError::ledger(
            loan.id,
            format!("repayment {} belongs to loan {}", repayment.id, repayment.loan_id),
        ));
    }
    if !loan.is_balanced() {
        return Err(EngineError::ledger(
            loan.id,
            "remaining balance does not equal total minus paid",
        ));
    }
    if repayment.amount > loan.total_paid {
        return Err(EngineError::ledger(
            loan.id,
            format!(
                "reversing repayment {} of {} exceeds the {} paid so far",
                repayment.id, repayment.amount, loan.total_paid
            ),
        ));
    }

    Ok(EmployeeLoan {
        remaining_balance: loan.remaining_balance + repayment.amount,
        total_paid: loan.total_paid - repayment.amount,
        status: match loan.status {
            LoanStatus::Completed => LoanStatus::Active,
            other => other,
        },
        ..loan.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn active_loan(total: &str, monthly: &str) -> EmployeeLoan {
        let loan = create_loan(
            Uuid::new_v4(),
            NewLoan {
                tenant_id: Uuid::nil(),
                employee_id: Uuid::nil(),
                principal: dec(total),
                interest_rate: Decimal::ZERO,
                monthly_deduction: dec(monthly),
                purpose: None,
            },
        )
        .unwrap();
        approve_loan(&loan, date(2025, 1, 1)).unwrap()
    }

    fn payroll_deduction(amount: Decimal) -> RepaymentRequest {
        RepaymentRequest {
            repayment_id: Uuid::new_v4(),
            amount,
            date: date(2025, 1, 31),
            repayment_type: RepaymentType::PayrollDeduction,
            payroll_id: Some(Uuid::new_v4()),
            notes: None,
        }
    }

    #[test]
    fn test_interest_added_to_total() {
        let loan = create_loan(
            Uuid::new_v4(),
            NewLoan {
                tenant_id: Uuid::nil(),
                employee_id: Uuid::nil(),
                principal: dec("12000"),
                interest_rate: dec("12.5"),
                monthly_deduction: dec("1000"),
                purpose: Some("Rent deposit".to_string()),
            },
        )
        .unwrap();
        assert_eq!(loan.total_amount, dec("13500"));
        assert!(loan.is_balanced());
    }

    #[test]
    fn test_invalid_loan_requests_rejected() {
        let request = NewLoan {
            tenant_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            principal: Decimal::ZERO,
            interest_rate: Decimal::ZERO,
            monthly_deduction: dec("100"),
            purpose: None,
        };
        assert!(create_loan(Uuid::new_v4(), request.clone()).is_err());
        let request = NewLoan {
            principal: dec("100"),
            monthly_deduction: Decimal::ZERO,
            ..request
        };
        assert!(create_loan(Uuid::new_v4(), request).is_err());
    }

    #[test]
    fn test_approve_only_from_pending() {
        let loan = active_loan("1000", "100");
        assert!(approve_loan(&loan, date(2025, 2, 1)).is_err());
    }

    #[test]
    fn test_final_repayment_completes_loan() {
        let loan = active_loan("1000", "600");
        let (loan, first) = book_repayment(&loan, payroll_deduction(dec("600"))).unwrap();
        assert_eq!(first.balance_after, dec("400"));
        assert_eq!(loan.status, LoanStatus::Active);

        let (loan, second) = book_repayment(&loan, payroll_deduction(dec("400"))).unwrap();
        assert_eq!(second.balance_after, Decimal::ZERO);
        assert_eq!(loan.status, LoanStatus::Completed);
        assert!(loan.is_balanced());
    }

    #[test]
    fn test_overpayment_is_ledger_inconsistency() {
        let loan = active_loan("1000", "600");
        let result = book_repayment(&loan, payroll_deduction(dec("1000.01")));
        assert!(matches!(result, Err(EngineError::LedgerInconsistency { .. })));
    }

    #[test]
    fn test_reversal_restores_completed_loan() {
        let loan = active_loan("500", "600");
        let (completed, repayment) = book_repayment(&loan, payroll_deduction(dec("500"))).unwrap();
        assert_eq!(completed.status, LoanStatus::Completed);

        let restored = reverse_repayment(&completed, &repayment).unwrap();
        assert_eq!(restored, loan);
    }

    #[test]
    fn test_reversal_of_earlier_repayment_keeps_later_ones() {
        let loan = active_loan("1000", "100");
        let (loan, first) = book_repayment(&loan, payroll_deduction(dec("100"))).unwrap();
        let (loan, _second) = book_repayment(&loan, payroll_deduction(dec("250"))).unwrap();

        let restored = reverse_repayment(&loan, &first).unwrap();
        assert_eq!(restored.remaining_balance, dec("750"));
        assert_eq!(restored.total_paid, dec("250"));
        assert!(restored.is_balanced());
    }

    #[test]
    fn test_reversal_beyond_amount_paid_rejected() {
        let loan = active_loan("1000", "100");
        let (_, repayment) = book_repayment(&loan, payroll_deduction(dec("100"))).unwrap();
        assert!(matches!(
            reverse_repayment(&loan, &repayment),
            Err(EngineError::LedgerInconsistency { .. })
        ));
    }

    #[test]
    fn test_write_off_requires_reason_and_active() {
        let loan = active_loan("1000", "100");
        assert!(write_off_loan(&loan, "  ").is_err());
        let written_off = write_off_loan(&loan, "Employee absconded").unwrap();
        assert_eq!(written_off.status, LoanStatus::WrittenOff);
        assert!(write_off_loan(&written_off, "again").is_err());
        assert!(book_repayment(&written_off, payroll_deduction(dec("10"))).is_err());
    }

    proptest! {
        #[test]
        fn prop_balance_never_increases_and_never_negative(
            installments in proptest::collection::vec(1i64..50_000, 1..30),
        ) {
            let mut loan = active_loan("100000", "5000");
            let mut previous = loan.remaining_balance;
            for cents in installments {
                let amount = Decimal::new(cents, 2).min(loan.remaining_balance);
                if loan.status != LoanStatus::Active || amount.is_zero() {
                    break;
                }
                let (next, repayment) = book_repayment(&loan, payroll_deduction(amount)).unwrap();
                prop_assert!(next.remaining_balance <= previous);
                prop_assert!(next.remaining_balance >= Decimal::ZERO);
                prop_assert!(next.is_balanced());
                prop_assert_eq!(repayment.balance_after, next.remaining_balance);
                previous = next.remaining_balance;
                loan = next;
            }
        }
    }
}
