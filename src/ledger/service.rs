//! Loan administration against the store.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::{
    NewLoan, RepaymentRequest, approve_loan, book_repayment, create_loan, write_off_loan,
};
use crate::collaborators::{AuditEntry, AuditSink, record_best_effort};
use crate::error::{EngineError, EngineResult};
use crate::models::{EmployeeLoan, LoanRepayment, LoanStatus, RepaymentType};
use crate::store::{LoanPosting, PayrollStore};

const LOAN_ENTITY: &str = "employee_loan";

/// Records a loan balance change with the audit sink.
pub fn audit_loan_balance(
    audit: &dyn AuditSink,
    loan_id: Uuid,
    old_balance: Decimal,
    new_balance: Decimal,
    actor: &str,
) {
    record_best_effort(
        audit,
        AuditEntry::change(
            LOAN_ENTITY,
            loan_id,
            "remaining_balance",
            old_balance,
            new_balance,
            actor,
        ),
    );
}

/// Records the balance change of a posting, and completion if it paid the
/// loan off.
pub fn audit_loan_posting(audit: &dyn AuditSink, posting: &LoanPosting, actor: &str) {
    let loan = &posting.updated_loan;
    audit_loan_balance(
        audit,
        loan.id,
        posting.previous.remaining_balance,
        loan.remaining_balance,
        actor,
    );
    if loan.status == LoanStatus::Completed {
        record_best_effort(
            audit,
            AuditEntry::change(
                LOAN_ENTITY,
                loan.id,
                "status",
                format!("{:?}", LoanStatus::Active),
                format!("{:?}", LoanStatus::Completed),
                actor,
            ),
        );
    }
}

fn audit_status(audit: &dyn AuditSink, before: &EmployeeLoan, after: &EmployeeLoan, actor: &str) {
    if before.status != after.status {
        record_best_effort(
            audit,
            AuditEntry::change(
                LOAN_ENTITY,
                after.id,
                "status",
                format!("{:?}", before.status),
                format!("{:?}", after.status),
                actor,
            ),
        );
    }
}

/// Creates, approves, writes off and manually repays employee loans.
pub struct LoanLedger {
    store: Arc<dyn PayrollStore>,
    audit: Arc<dyn AuditSink>,
}

impl LoanLedger {
    /// Creates a ledger over `store`, auditing to `audit`.
    pub fn new(store: Arc<dyn PayrollStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Opens a pending loan.
    pub fn create_loan(&self, request: NewLoan) -> EngineResult<EmployeeLoan> {
        let loan = create_loan(Uuid::new_v4(), request)?;
        self.store.insert_loan(loan.clone())?;
        info!(
            loan_id = %loan.id,
            employee_id = %loan.employee_id,
            total_amount = %loan.total_amount,
            "Loan created"
        );
        Ok(loan)
    }

    /// Approves a pending loan; installments start on `repayment_start_date`.
    pub fn approve_loan(
        &self,
        loan_id: Uuid,
        repayment_start_date: NaiveDate,
        actor: &str,
    ) -> EngineResult<EmployeeLoan> {
        let current = self.store.loan(loan_id)?;
        let approved = approve_loan(&current, repayment_start_date)?;
        self.store.update_loan(&current, approved.clone())?;
        audit_status(self.audit.as_ref(), &current, &approved, actor);
        info!(%loan_id, %repayment_start_date, "Loan approved");
        Ok(approved)
    }

    /// Writes off an active loan.
    pub fn write_off_loan(
        &self,
        loan_id: Uuid,
        reason: &str,
        actor: &str,
    ) -> EngineResult<EmployeeLoan> {
        let current = self.store.loan(loan_id)?;
        let written_off = write_off_loan(&current, reason)?;
        self.store.update_loan(&current, written_off.clone())?;
        audit_status(self.audit.as_ref(), &current, &written_off, actor);
        info!(%loan_id, remaining_balance = %written_off.remaining_balance, "Loan written off");
        Ok(written_off)
    }

    /// Books a repayment made outside payroll.
    ///
    /// The amount is capped at the remaining balance; a repayment that
    /// clears the balance completes the loan.
    pub fn record_manual_repayment(
        &self,
        loan_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        notes: Option<String>,
        actor: &str,
    ) -> EngineResult<LoanRepayment> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::validation("Repayment amount must be positive"));
        }
        let current = self.store.loan(loan_id)?;
        let (updated, repayment) = book_repayment(
            &current,
            RepaymentRequest {
                repayment_id: Uuid::new_v4(),
                amount: amount.min(current.remaining_balance),
                date,
                repayment_type: RepaymentType::Manual,
                payroll_id: None,
                notes,
            },
        )?;

        let posting = LoanPosting {
            previous: current,
            updated_loan: updated,
            repayment: repayment.clone(),
        };
        self.store.post_loan_repayment(posting.clone())?;
        audit_loan_posting(self.audit.as_ref(), &posting, actor);
        info!(
            %loan_id,
            amount = %repayment.amount,
            balance_after = %repayment.balance_after,
            "Manual repayment recorded"
        );
        Ok(repayment)
    }

    /// Fetches a loan.
    pub fn loan(&self, loan_id: Uuid) -> EngineResult<EmployeeLoan> {
        self.store.loan(loan_id)
    }

    /// Repayment history of a loan.
    pub fn repayments(&self, loan_id: Uuid) -> EngineResult<Vec<LoanRepayment>> {
        self.store.loan_repayments(loan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RecordingAuditSink;
    use crate::store::InMemoryStore;

    fn ledger() -> (LoanLedger, Arc<RecordingAuditSink>) {
        let audit = Arc::new(RecordingAuditSink::new());
        (LoanLedger::new(Arc::new(InMemoryStore::new()), audit.clone()), audit)
    }

    fn request() -> NewLoan {
        NewLoan {
            tenant_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            principal: Decimal::from(5_000),
            interest_rate: Decimal::ZERO,
            monthly_deduction: Decimal::from(1_000),
            purpose: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_manual_repayment_capped_and_completes() {
        let (ledger, audit) = ledger();
        let loan = ledger.create_loan(request()).unwrap();
        ledger.approve_loan(loan.id, date(2025, 1, 1), "hr").unwrap();

        let repayment = ledger
            .record_manual_repayment(loan.id, Decimal::from(9_000), date(2025, 1, 10), None, "hr")
            .unwrap();

        assert_eq!(repayment.amount, Decimal::from(5_000));
        assert_eq!(repayment.repayment_type, RepaymentType::Manual);
        let stored = ledger.loan(loan.id).unwrap();
        assert_eq!(stored.status, LoanStatus::Completed);
        assert!(stored.is_balanced());
        assert_eq!(ledger.repayments(loan.id).unwrap().len(), 1);

        let fields: Vec<String> = audit
            .entries_for(loan.id)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec!["status", "remaining_balance", "status"]);
    }

    #[test]
    fn test_pending_loan_cannot_be_repaid() {
        let (ledger, _) = ledger();
        let loan = ledger.create_loan(request()).unwrap();
        let result = ledger.record_manual_repayment(
            loan.id,
            Decimal::from(100),
            date(2025, 1, 10),
            None,
            "hr",
        );
        assert!(matches!(result, Err(EngineError::LedgerInconsistency { .. })));
    }

    #[test]
    fn test_write_off_recorded() {
        let (ledger, _) = ledger();
        let loan = ledger.create_loan(request()).unwrap();
        ledger.approve_loan(loan.id, date(2025, 1, 1), "hr").unwrap();
        let written_off = ledger.write_off_loan(loan.id, "Deceased", "finance").unwrap();
        assert_eq!(written_off.write_off_reason.as_deref(), Some("Deceased"));
        assert_eq!(ledger.loan(loan.id).unwrap().status, LoanStatus::WrittenOff);
    }
}
