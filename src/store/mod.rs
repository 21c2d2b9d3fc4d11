//! Persistence contract for the payroll engine.
//!
//! [`PayrollStore`] is the only way the services touch state. Every method
//! is one atomic unit: a per-employee commit either lands completely (payroll,
//! items, loan balances and repayments) or not at all, and status changes
//! are compare-and-swap updates guarded by the expected current status.

mod memory;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{
    EmployeeLoan, EmployeeSalaryComponent, LoanRepayment, PaymentDetails, Payroll, PayrollItem,
    PayrollPeriod, PayrollStatus, PeriodStatus, PeriodTotals, ProcessingSummary, SalaryComponent,
};

pub use memory::InMemoryStore;

/// A loan balance change and the repayment row that explains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanPosting {
    /// The loan row the change was computed from; the store refuses the
    /// posting unless the stored loan still equals it.
    pub previous: EmployeeLoan,
    /// The loan after the repayment.
    pub updated_loan: EmployeeLoan,
    /// The repayment row to append.
    pub repayment: LoanRepayment,
}

/// Everything one employee's processing writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayrollCommit {
    /// The payroll row.
    pub payroll: Payroll,
    /// Its line items.
    pub items: Vec<PayrollItem>,
    /// Loan installments booked by this payroll.
    pub loan_postings: Vec<LoanPosting>,
}

/// What a reset removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Payroll rows deleted.
    pub payrolls_removed: usize,
    /// Loans restored, with their balance before the reversal.
    pub reversed_loans: Vec<(Decimal, EmployeeLoan)>,
}

/// Reverses one repayment; supplied by the loan ledger.
pub type ReverseFn<'a> = &'a dyn Fn(&EmployeeLoan, &LoanRepayment) -> EngineResult<EmployeeLoan>;

/// Storage backend for periods, configuration, loans and payrolls.
pub trait PayrollStore: Send + Sync {
    /// Inserts a period.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PeriodOverlap`] if another period of the tenant shares a day with it
    ///
    /// [`EngineError::PeriodOverlap`]: crate::error::EngineError::PeriodOverlap
    fn insert_period(&self, period: PayrollPeriod) -> EngineResult<()>;

    /// Fetches a period.
    fn period(&self, period_id: Uuid) -> EngineResult<PayrollPeriod>;

    /// All periods of a tenant, ordered by start date.
    fn tenant_periods(&self, tenant_id: Uuid) -> EngineResult<Vec<PayrollPeriod>>;

    /// Moves a period from `expected` to `next`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ConcurrencyConflict`] if the stored status is not `expected`
    /// - [`EngineError::InvalidTransition`] if the edge is not allowed
    ///
    /// [`EngineError::ConcurrencyConflict`]: crate::error::EngineError::ConcurrencyConflict
    /// [`EngineError::InvalidTransition`]: crate::error::EngineError::InvalidTransition
    fn transition_period(
        &self,
        period_id: Uuid,
        expected: PeriodStatus,
        next: PeriodStatus,
    ) -> EngineResult<PayrollPeriod>;

    /// Caches totals and, when given, the last processing summary.
    fn save_period_results(
        &self,
        period_id: Uuid,
        totals: PeriodTotals,
        summary: Option<ProcessingSummary>,
    ) -> EngineResult<()>;

    /// Takes the advisory lock of a period. Returns false if it is held.
    fn try_acquire_period_lock(&self, period_id: Uuid) -> EngineResult<bool>;

    /// Releases the advisory lock of a period.
    fn release_period_lock(&self, period_id: Uuid) -> EngineResult<()>;

    /// Inserts or replaces a component definition.
    fn save_component(&self, component: SalaryComponent) -> EngineResult<()>;

    /// Fetches a component.
    fn component(&self, component_id: Uuid) -> EngineResult<SalaryComponent>;

    /// All components of a tenant.
    fn tenant_components(&self, tenant_id: Uuid) -> EngineResult<Vec<SalaryComponent>>;

    /// Appends an assignment, rejecting overlap with the employee's rows for
    /// the same component.
    fn insert_assignment(&self, assignment: EmployeeSalaryComponent) -> EngineResult<()>;

    /// Closes `closing` at `effective_to` and appends `next` in one step.
    fn revise_assignment(
        &self,
        closing: Uuid,
        effective_to: NaiveDate,
        next: EmployeeSalaryComponent,
    ) -> EngineResult<()>;

    /// All assignment rows of an employee, history included.
    fn employee_assignments(
        &self,
        employee_id: Uuid,
    ) -> EngineResult<Vec<EmployeeSalaryComponent>>;

    /// Inserts a new loan.
    fn insert_loan(&self, loan: EmployeeLoan) -> EngineResult<()>;

    /// Replaces a loan if it still equals `expected`.
    fn update_loan(&self, expected: &EmployeeLoan, updated: EmployeeLoan) -> EngineResult<()>;

    /// Fetches a loan.
    fn loan(&self, loan_id: Uuid) -> EngineResult<EmployeeLoan>;

    /// All loans of an employee.
    fn employee_loans(&self, employee_id: Uuid) -> EngineResult<Vec<EmployeeLoan>>;

    /// Repayments of a loan, oldest first.
    fn loan_repayments(&self, loan_id: Uuid) -> EngineResult<Vec<LoanRepayment>>;

    /// Applies a balance change outside payroll (manual repayment).
    fn post_loan_repayment(&self, posting: LoanPosting) -> EngineResult<()>;

    /// Writes one employee's payroll, items and loan postings atomically.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PeriodLocked`] if the period's rows are frozen
    /// - [`EngineError::LedgerInconsistency`] if a loan balance moved since it was read
    /// - [`EngineError::ConcurrencyConflict`] if the employee already has a payroll in the period
    ///
    /// [`EngineError::PeriodLocked`]: crate::error::EngineError::PeriodLocked
    /// [`EngineError::LedgerInconsistency`]: crate::error::EngineError::LedgerInconsistency
    /// [`EngineError::ConcurrencyConflict`]: crate::error::EngineError::ConcurrencyConflict
    fn commit_employee_payroll(&self, commit: PayrollCommit) -> EngineResult<()>;

    /// Deletes every payroll of a period, reversing their loan repayments
    /// with `reverse`. Nothing changes if any reversal fails.
    fn reset_period_payrolls(
        &self,
        period_id: Uuid,
        reverse: ReverseFn<'_>,
    ) -> EngineResult<ResetReport>;

    /// Payrolls of a period, ordered by employee id.
    fn period_payrolls(&self, period_id: Uuid) -> EngineResult<Vec<Payroll>>;

    /// Items of a payroll, in line order.
    fn payroll_items(&self, payroll_id: Uuid) -> EngineResult<Vec<PayrollItem>>;

    /// Moves every payroll of a period in status `from` to `to`, stamping
    /// payment details when given. Returns the number of rows changed.
    fn set_payroll_status(
        &self,
        period_id: Uuid,
        from: PayrollStatus,
        to: PayrollStatus,
        payment: Option<PaymentDetails>,
    ) -> EngineResult<usize>;

    /// Freezes a period's payroll rows against further change.
    fn freeze_period(&self, period_id: Uuid) -> EngineResult<()>;
}

/// Holds a period's advisory lock until dropped.
pub struct PeriodLockGuard<'a> {
    store: &'a dyn PayrollStore,
    period_id: Uuid,
}

impl<'a> PeriodLockGuard<'a> {
    /// Takes the lock or fails with a retryable conflict.
    pub fn acquire(store: &'a dyn PayrollStore, period_id: Uuid) -> EngineResult<Self> {
        if store.try_acquire_period_lock(period_id)? {
            Ok(Self { store, period_id })
        } else {
            Err(crate::error::EngineError::ConcurrencyConflict {
                period_id,
                message: "another operation holds the period lock".to_string(),
            })
        }
    }
}

impl Drop for PeriodLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.store.release_period_lock(self.period_id) {
            tracing::warn!(period_id = %self.period_id, %error, "Failed to release period lock");
        }
    }
}
