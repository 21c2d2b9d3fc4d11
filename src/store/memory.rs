//! In-memory [`PayrollStore`].
//!
//! All state sits behind one `parking_lot::RwLock`, so each trait method is
//! trivially atomic and a panicking writer never poisons the store.
//! Suitable for tests, benchmarks and single-process embedding.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{LoanPosting, PayrollCommit, PayrollStore, ResetReport, ReverseFn};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    EmployeeLoan, EmployeeSalaryComponent, LoanRepayment, PaymentDetails, Payroll, PayrollItem,
    PayrollPeriod, PayrollStatus, PeriodStatus, PeriodTotals, ProcessingSummary, SalaryComponent,
};

#[derive(Debug, Default)]
struct State {
    periods: HashMap<Uuid, PayrollPeriod>,
    period_locks: HashSet<Uuid>,
    frozen_periods: HashSet<Uuid>,
    components: HashMap<Uuid, SalaryComponent>,
    assignments: Vec<EmployeeSalaryComponent>,
    loans: HashMap<Uuid, EmployeeLoan>,
    repayments: Vec<LoanRepayment>,
    payrolls: HashMap<Uuid, Payroll>,
    items: HashMap<Uuid, Vec<PayrollItem>>,
}

impl State {
    fn period_mut(&mut self, period_id: Uuid) -> EngineResult<&mut PayrollPeriod> {
        self.periods.get_mut(&period_id).ok_or(EngineError::NotFound {
            entity: "payroll_period",
            id: period_id,
        })
    }

    fn ensure_not_frozen(&self, period_id: Uuid) -> EngineResult<()> {
        if self.frozen_periods.contains(&period_id) {
            return Err(EngineError::PeriodLocked { period_id });
        }
        Ok(())
    }

    fn check_assignment_overlap(
        &self,
        assignment: &EmployeeSalaryComponent,
        ignore: Option<Uuid>,
    ) -> EngineResult<()> {
        let clash = self.assignments.iter().find(|row| {
            Some(row.id) != ignore
                && row.id != assignment.id
                && row.employee_id == assignment.employee_id
                && row.component_id == assignment.component_id
                && row.overlaps(assignment)
        });
        match clash {
            Some(row) => Err(EngineError::validation(format!(
                "Assignment overlaps existing assignment {} from {}",
                row.id, row.effective_from
            ))),
            None => Ok(()),
        }
    }

    fn check_posting(&self, posting: &LoanPosting) -> EngineResult<()> {
        let loan_id = posting.updated_loan.id;
        let stored = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "employee_loan",
            id: loan_id,
        })?;
        if *stored != posting.previous {
            return Err(EngineError::ledger(
                loan_id,
                format!(
                    "loan changed before the repayment was booked \
                     (balance {} -> {}, status {:?} -> {:?})",
                    posting.previous.remaining_balance,
                    stored.remaining_balance,
                    posting.previous.status,
                    stored.status
                ),
            ));
        }
        if !posting.updated_loan.is_balanced() {
            return Err(EngineError::ledger(
                loan_id,
                "posting would break the balance invariant",
            ));
        }
        Ok(())
    }

    fn apply_posting(&mut self, posting: LoanPosting) {
        self.loans
            .insert(posting.updated_loan.id, posting.updated_loan);
        self.repayments.push(posting.repayment);
    }
}

/// A [`PayrollStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayrollStore for InMemoryStore {
    fn insert_period(&self, period: PayrollPeriod) -> EngineResult<()> {
        let mut state = self.state.write();
        if state.periods.contains_key(&period.id) {
            return Err(EngineError::validation(format!(
                "Period {} already exists",
                period.id
            )));
        }
        if let Some(existing) = state.periods.values().find(|p| {
            p.tenant_id == period.tenant_id && p.overlaps_range(period.start_date, period.end_date)
        }) {
            return Err(EngineError::PeriodOverlap {
                existing_period_id: existing.id,
                start_date: period.start_date,
                end_date: period.end_date,
            });
        }
        state.periods.insert(period.id, period);
        Ok(())
    }

    fn period(&self, period_id: Uuid) -> EngineResult<PayrollPeriod> {
        self.state
            .read()
            .periods
            .get(&period_id)
            .cloned()
            .ok_or(EngineError::NotFound {
                entity: "payroll_period",
                id: period_id,
            })
    }

    fn tenant_periods(&self, tenant_id: Uuid) -> EngineResult<Vec<PayrollPeriod>> {
        let state = self.state.read();
        let mut periods: Vec<PayrollPeriod> = state
            .periods
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    fn transition_period(
        &self,
        period_id: Uuid,
        expected: PeriodStatus,
        next: PeriodStatus,
    ) -> EngineResult<PayrollPeriod> {
        let mut state = self.state.write();
        let period = state.period_mut(period_id)?;
        if period.status != expected {
            return Err(EngineError::ConcurrencyConflict {
                period_id,
                message: format!("expected status {}, found {}", expected, period.status),
            });
        }
        if !expected.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                period_id,
                status: expected,
                action: next.as_str(),
            });
        }
        period.status = next;
        Ok(period.clone())
    }

    fn save_period_results(
        &self,
        period_id: Uuid,
        totals: PeriodTotals,
        summary: Option<ProcessingSummary>,
    ) -> EngineResult<()> {
        let mut state = self.state.write();
        let period = state.period_mut(period_id)?;
        period.totals = totals;
        if summary.is_some() {
            period.last_run = summary;
        }
        Ok(())
    }

    fn try_acquire_period_lock(&self, period_id: Uuid) -> EngineResult<bool> {
        Ok(self.state.write().period_locks.insert(period_id))
    }

    fn release_period_lock(&self, period_id: Uuid) -> EngineResult<()> {
        self.state.write().period_locks.remove(&period_id);
        Ok(())
    }

    fn save_component(&self, component: SalaryComponent) -> EngineResult<()> {
        self.state.write().components.insert(component.id, component);
        Ok(())
    }

    fn component(&self, component_id: Uuid) -> EngineResult<SalaryComponent> {
        self.state
            .read()
            .components
            .get(&component_id)
            .cloned()
            .ok_or(EngineError::NotFound {
                entity: "salary_component",
                id: component_id,
            })
    }

    fn tenant_components(&self, tenant_id: Uuid) -> EngineResult<Vec<SalaryComponent>> {
        let state = self.state.read();
        let mut components: Vec<SalaryComponent> = state
            .components
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        components.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(components)
    }

    fn insert_assignment(&self, assignment: EmployeeSalaryComponent) -> EngineResult<()> {
        let mut state = self.state.write();
        state.check_assignment_overlap(&assignment, None)?;
        state.assignments.push(assignment);
        Ok(())
    }

    fn revise_assignment(
        &self,
        closing: Uuid,
        effective_to: NaiveDate,
        next: EmployeeSalaryComponent,
    ) -> EngineResult<()> {
        let mut state = self.state.write();
        let index = state
            .assignments
            .iter()
            .position(|a| a.id == closing)
            .ok_or(EngineError::NotFound {
                entity: "employee_salary_component",
                id: closing,
            })?;

        let mut closed = state.assignments[index].clone();
        if effective_to <= closed.effective_from {
            return Err(EngineError::validation(format!(
                "Revision date {} is not after the assignment start {}",
                effective_to, closed.effective_from
            )));
        }
        if closed.effective_to.is_some_and(|to| to < effective_to) {
            return Err(EngineError::validation(format!(
                "Assignment {} already ended before {}",
                closed.id, effective_to
            )));
        }
        closed.effective_to = Some(effective_to);

        state.check_assignment_overlap(&next, Some(closing))?;
        if closed.overlaps(&next) {
            return Err(EngineError::validation(
                "Revised assignment overlaps the row it replaces",
            ));
        }

        state.assignments[index] = closed;
        state.assignments.push(next);
        Ok(())
    }

    fn employee_assignments(
        &self,
        employee_id: Uuid,
    ) -> EngineResult<Vec<EmployeeSalaryComponent>> {
        Ok(self
            .state
            .read()
            .assignments
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect())
    }

    fn insert_loan(&self, loan: EmployeeLoan) -> EngineResult<()> {
        let mut state = self.state.write();
        if state.loans.contains_key(&loan.id) {
            return Err(EngineError::validation(format!("Loan {} already exists", loan.id)));
        }
        state.loans.insert(loan.id, loan);
        Ok(())
    }

    fn update_loan(&self, expected: &EmployeeLoan, updated: EmployeeLoan) -> EngineResult<()> {
        let mut state = self.state.write();
        let stored = state.loans.get_mut(&expected.id).ok_or(EngineError::NotFound {
            entity: "employee_loan",
            id: expected.id,
        })?;
        if *stored != *expected {
            return Err(EngineError::ledger(expected.id, "loan changed concurrently"));
        }
        *stored = updated;
        Ok(())
    }

    fn loan(&self, loan_id: Uuid) -> EngineResult<EmployeeLoan> {
        self.state
            .read()
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or(EngineError::NotFound {
                entity: "employee_loan",
                id: loan_id,
            })
    }

    fn employee_loans(&self, employee_id: Uuid) -> EngineResult<Vec<EmployeeLoan>> {
        let state = self.state.read();
        let mut loans: Vec<EmployeeLoan> = state
            .loans
            .values()
            .filter(|l| l.employee_id == employee_id)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    fn loan_repayments(&self, loan_id: Uuid) -> EngineResult<Vec<LoanRepayment>> {
        Ok(self
            .state
            .read()
            .repayments
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect())
    }

    fn post_loan_repayment(&self, posting: LoanPosting) -> EngineResult<()> {
        let mut state = self.state.write();
        state.check_posting(&posting)?;
        state.apply_posting(posting);
        Ok(())
    }

    fn commit_employee_payroll(&self, commit: PayrollCommit) -> EngineResult<()> {
        let mut state = self.state.write();
        let period_id = commit.payroll.period_id;

        if !state.periods.contains_key(&period_id) {
            return Err(EngineError::NotFound {
                entity: "payroll_period",
                id: period_id,
            });
        }
        state.ensure_not_frozen(period_id)?;

        if state.payrolls.contains_key(&commit.payroll.id)
            || state.payrolls.values().any(|p| {
                p.period_id == period_id && p.employee_id == commit.payroll.employee_id
            })
        {
            return Err(EngineError::ConcurrencyConflict {
                period_id,
                message: format!(
                    "employee {} already has a payroll in this period",
                    commit.payroll.employee_id
                ),
            });
        }

        for posting in &commit.loan_postings {
            state.check_posting(posting)?;
        }

        for posting in commit.loan_postings {
            state.apply_posting(posting);
        }
        state.items.insert(commit.payroll.id, commit.items);
        state.payrolls.insert(commit.payroll.id, commit.payroll);
        Ok(())
    }

    fn reset_period_payrolls(
        &self,
        period_id: Uuid,
        reverse: ReverseFn<'_>,
    ) -> EngineResult<ResetReport> {
        let mut state = self.state.write();
        state.ensure_not_frozen(period_id)?;

        let payroll_ids: HashSet<Uuid> = state
            .payrolls
            .values()
            .filter(|p| p.period_id == period_id)
            .map(|p| p.id)
            .collect();
        if payroll_ids.is_empty() {
            return Ok(ResetReport::default());
        }

        let belongs = |r: &LoanRepayment| r.payroll_id.is_some_and(|id| payroll_ids.contains(&id));

        // Newest first; the whole reset is dropped if any reversal fails.
        let mut restored: HashMap<Uuid, EmployeeLoan> = HashMap::new();
        let mut reversed_loans = Vec::new();
        for repayment in state.repayments.iter().rev().filter(|r| belongs(r)) {
            let current = match restored.get(&repayment.loan_id) {
                Some(loan) => loan.clone(),
                None => state
                    .loans
                    .get(&repayment.loan_id)
                    .cloned()
                    .ok_or(EngineError::NotFound {
                        entity: "employee_loan",
                        id: repayment.loan_id,
                    })?,
            };
            let next = reverse(&current, repayment)?;
            reversed_loans.push((current.remaining_balance, next.clone()));
            restored.insert(next.id, next);
        }

        for (id, loan) in restored {
            state.loans.insert(id, loan);
        }
        state.repayments.retain(|r| !belongs(r));
        state.items.retain(|id, _| !payroll_ids.contains(id));
        state.payrolls.retain(|id, _| !payroll_ids.contains(id));

        Ok(ResetReport {
            payrolls_removed: payroll_ids.len(),
            reversed_loans,
        })
    }

    fn period_payrolls(&self, period_id: Uuid) -> EngineResult<Vec<Payroll>> {
        let state = self.state.read();
        let mut payrolls: Vec<Payroll> = state
            .payrolls
            .values()
            .filter(|p| p.period_id == period_id)
            .cloned()
            .collect();
        payrolls.sort_by_key(|p| p.employee_id);
        Ok(payrolls)
    }

    fn payroll_items(&self, payroll_id: Uuid) -> EngineResult<Vec<PayrollItem>> {
        let state = self.state.read();
        if !state.payrolls.contains_key(&payroll_id) {
            return Err(EngineError::NotFound {
                entity: "payroll",
                id: payroll_id,
            });
        }
        Ok(state.items.get(&payroll_id).cloned().unwrap_or_default())
    }

    fn set_payroll_status(
        &self,
        period_id: Uuid,
        from: PayrollStatus,
        to: PayrollStatus,
        payment: Option<PaymentDetails>,
    ) -> EngineResult<usize> {
        let mut state = self.state.write();
        state.ensure_not_frozen(period_id)?;

        let mut changed = 0;
        for payroll in state
            .payrolls
            .values_mut()
            .filter(|p| p.period_id == period_id && p.status == from)
        {
            payroll.status = to;
            if let Some(details) = &payment {
                payroll.payment_method = Some(details.method);
                payroll.payment_reference = Some(details.reference.clone());
            }
            changed += 1;
        }
        Ok(changed)
    }

    fn freeze_period(&self, period_id: Uuid) -> EngineResult<()> {
        let mut state = self.state.write();
        if !state.periods.contains_key(&period_id) {
            return Err(EngineError::NotFound {
                entity: "payroll_period",
                id: period_id,
            });
        }
        state.frozen_periods.insert(period_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{reverse_repayment, write_off_loan};
    use crate::models::{LoanStatus, RepaymentType};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(tenant_id: Uuid, start: NaiveDate, end: NaiveDate) -> PayrollPeriod {
        PayrollPeriod {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Test".to_string(),
            start_date: start,
            end_date: end,
            pay_date: end,
            status: PeriodStatus::Draft,
            totals: PeriodTotals::default(),
            last_run: None,
            created_at: Utc::now(),
        }
    }

    fn loan(employee_id: Uuid, remaining: i64) -> EmployeeLoan {
        EmployeeLoan {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            employee_id,
            principal: Decimal::from(1_000),
            interest_rate: Decimal::ZERO,
            total_amount: Decimal::from(1_000),
            monthly_deduction: Decimal::from(100),
            remaining_balance: Decimal::from(remaining),
            total_paid: Decimal::from(1_000 - remaining),
            status: LoanStatus::Active,
            repayment_start_date: Some(date(2025, 1, 1)),
            purpose: None,
            write_off_reason: None,
        }
    }

    fn commit_with_loan(period: &PayrollPeriod, employee_id: Uuid, loan: &EmployeeLoan) -> PayrollCommit {
        let payroll_id = Uuid::new_v4();
        let mut payroll = Payroll::failed(payroll_id, period.id, employee_id, "", vec![]);
        payroll.status = PayrollStatus::Calculated;
        payroll.failure_reason = None;
        let updated = EmployeeLoan {
            remaining_balance: loan.remaining_balance - Decimal::from(100),
            total_paid: loan.total_paid + Decimal::from(100),
            ..loan.clone()
        };
        PayrollCommit {
            payroll,
            items: vec![],
            loan_postings: vec![LoanPosting {
                previous: loan.clone(),
                repayment: LoanRepayment {
                    id: Uuid::new_v4(),
                    loan_id: loan.id,
                    amount: Decimal::from(100),
                    repayment_date: period.pay_date,
                    repayment_type: RepaymentType::PayrollDeduction,
                    balance_after: updated.remaining_balance,
                    payroll_id: Some(payroll_id),
                    notes: None,
                },
                updated_loan: updated,
            }],
        }
    }

    #[test]
    fn test_overlapping_period_rejected() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        store
            .insert_period(period(tenant, date(2025, 1, 1), date(2025, 1, 31)))
            .unwrap();

        let result = store.insert_period(period(tenant, date(2025, 1, 31), date(2025, 2, 27)));
        assert!(matches!(result, Err(EngineError::PeriodOverlap { .. })));

        // other tenants are independent
        assert!(
            store
                .insert_period(period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31)))
                .is_ok()
        );
    }

    #[test]
    fn test_transition_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        let id = p.id;
        store.insert_period(p).unwrap();

        store
            .transition_period(id, PeriodStatus::Draft, PeriodStatus::Processing)
            .unwrap();
        let second = store.transition_period(id, PeriodStatus::Draft, PeriodStatus::Processing);
        assert!(matches!(second, Err(EngineError::ConcurrencyConflict { .. })));
    }

    #[test]
    fn test_advisory_lock_is_exclusive() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        assert!(store.try_acquire_period_lock(id).unwrap());
        assert!(!store.try_acquire_period_lock(id).unwrap());
        store.release_period_lock(id).unwrap();
        assert!(store.try_acquire_period_lock(id).unwrap());
    }

    #[test]
    fn test_commit_rejects_moved_loan_balance() {
        let store = InMemoryStore::new();
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        store.insert_period(p.clone()).unwrap();
        let employee = Uuid::new_v4();
        let stored = loan(employee, 500);
        store.insert_loan(stored.clone()).unwrap();

        let mut stale = stored.clone();
        stale.remaining_balance = Decimal::from(600);
        stale.total_paid = Decimal::from(400);
        let result = store.commit_employee_payroll(commit_with_loan(&p, employee, &stale));

        assert!(matches!(result, Err(EngineError::LedgerInconsistency { .. })));
        assert!(store.period_payrolls(p.id).unwrap().is_empty());
        assert_eq!(store.loan(stored.id).unwrap(), stored);
    }

    #[test]
    fn test_commit_rejects_loan_written_off_meanwhile() {
        let store = InMemoryStore::new();
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        store.insert_period(p.clone()).unwrap();
        let employee = Uuid::new_v4();
        let read = loan(employee, 500);
        store.insert_loan(read.clone()).unwrap();

        let written_off = write_off_loan(&read, "Employee left").unwrap();
        store.update_loan(&read, written_off.clone()).unwrap();

        let result = store.commit_employee_payroll(commit_with_loan(&p, employee, &read));
        assert!(matches!(result, Err(EngineError::LedgerInconsistency { .. })));

        let stored = store.loan(read.id).unwrap();
        assert_eq!(stored, written_off);
        assert_eq!(stored.write_off_reason.as_deref(), Some("Employee left"));
        assert!(store.loan_repayments(read.id).unwrap().is_empty());
        assert!(store.period_payrolls(p.id).unwrap().is_empty());
    }

    #[test]
    fn test_store_usable_after_writer_panicked() {
        let store = Arc::new(InMemoryStore::new());
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        store.insert_period(p.clone()).unwrap();

        let crashing = store.clone();
        let joined = std::thread::spawn(move || {
            let _state = crashing.state.write();
            panic!("writer crashed");
        })
        .join();
        assert!(joined.is_err());

        assert_eq!(store.period(p.id).unwrap(), p);
        assert!(store.try_acquire_period_lock(p.id).unwrap());
    }

    #[test]
    fn test_reset_reverses_repayments() {
        let store = InMemoryStore::new();
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        store.insert_period(p.clone()).unwrap();
        let employee = Uuid::new_v4();
        let original = loan(employee, 500);
        store.insert_loan(original.clone()).unwrap();

        store
            .commit_employee_payroll(commit_with_loan(&p, employee, &original))
            .unwrap();
        assert_eq!(store.loan(original.id).unwrap().remaining_balance, Decimal::from(400));

        let report = store
            .reset_period_payrolls(p.id, &reverse_repayment)
            .unwrap();
        assert_eq!(report.payrolls_removed, 1);
        assert_eq!(report.reversed_loans.len(), 1);
        assert_eq!(store.loan(original.id).unwrap(), original);
        assert!(store.loan_repayments(original.id).unwrap().is_empty());
        assert!(store.period_payrolls(p.id).unwrap().is_empty());
    }

    #[test]
    fn test_frozen_period_rejects_writes() {
        let store = InMemoryStore::new();
        let p = period(Uuid::new_v4(), date(2025, 1, 1), date(2025, 1, 31));
        store.insert_period(p.clone()).unwrap();
        store.freeze_period(p.id).unwrap();

        let result = store.reset_period_payrolls(p.id, &reverse_repayment);
        assert!(matches!(result, Err(EngineError::PeriodLocked { .. })));
        let result = store.set_payroll_status(
            p.id,
            PayrollStatus::Approved,
            PayrollStatus::Paid,
            None,
        );
        assert!(matches!(result, Err(EngineError::PeriodLocked { .. })));
    }

    #[test]
    fn test_revise_assignment_closes_old_row() {
        let store = InMemoryStore::new();
        let employee = Uuid::new_v4();
        let component = Uuid::new_v4();
        let first = EmployeeSalaryComponent {
            id: Uuid::new_v4(),
            employee_id: employee,
            component_id: component,
            amount: Decimal::from(30_000),
            effective_from: date(2024, 1, 1),
            effective_to: None,
        };
        store.insert_assignment(first.clone()).unwrap();

        let next = EmployeeSalaryComponent {
            id: Uuid::new_v4(),
            amount: Decimal::from(35_000),
            effective_from: date(2025, 1, 1),
            ..first.clone()
        };
        store
            .revise_assignment(first.id, date(2025, 1, 1), next)
            .unwrap();

        let rows = store.employee_assignments(employee).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].effective_to, Some(date(2025, 1, 1)));
        assert_eq!(rows[0].amount, Decimal::from(30_000));
    }
}
