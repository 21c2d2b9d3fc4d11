//! Fans a period's employees out over a bounded worker pool.
//!
//! Each employee runs the pure calculation pipeline and commits its payroll,
//! items and loan postings as one store transaction. A failing employee is
//! recorded as a failed payroll row and reported in the summary; it never
//! aborts the rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calculation::{
    calculate_employee_payroll, plan_loan_deductions, resolve_salary_structure,
};
use crate::collaborators::{AuditSink, DomainEvent, NotificationSink};
use crate::config::ConfigLoader;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::ledger::{RepaymentRequest, audit_loan_posting, book_repayment};
use crate::models::{
    Employee, EmployeeFailure, Payroll, PayrollPeriod, PayrollWarning, ProcessingSummary,
    RepaymentType,
};
use crate::store::{LoanPosting, PayrollCommit, PayrollStore};

/// Deterministic id of an employee's payroll in a period.
pub fn payroll_id(period_id: Uuid, employee_id: Uuid) -> Uuid {
    Uuid::new_v5(&period_id, employee_id.as_bytes())
}

/// Deterministic id of the repayment a payroll books against a loan.
pub fn repayment_id(payroll_id: Uuid, loan_id: Uuid) -> Uuid {
    Uuid::new_v5(&payroll_id, loan_id.as_bytes())
}

/// How one employee's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeOutcome {
    /// The payroll was committed.
    Calculated {
        /// Warnings attached to the payroll.
        warnings: usize,
    },
    /// The employee could not be paid.
    Failed(EmployeeFailure),
}

/// Runs the per-employee pipeline for a period.
#[derive(Clone)]
pub struct PayrollOrchestrator {
    store: Arc<dyn PayrollStore>,
    config: Arc<ConfigLoader>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    actor: String,
}

impl PayrollOrchestrator {
    /// Creates an orchestrator; `actor` is recorded on audit entries.
    pub fn new(
        store: Arc<dyn PayrollStore>,
        config: Arc<ConfigLoader>,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            config,
            notifier,
            audit,
            actor: actor.into(),
        }
    }

    /// Processes every employee of `period` with at most
    /// `EngineSettings::effective_worker_limit` pipelines in flight.
    ///
    /// The period must already be cleared of earlier payroll rows.
    pub async fn run(
        &self,
        period: &PayrollPeriod,
        employees: Vec<Employee>,
    ) -> EngineResult<ProcessingSummary> {
        let worker_limit = self.config.settings().effective_worker_limit(employees.len());
        let semaphore = Arc::new(Semaphore::new(worker_limit));
        let mut pending: HashSet<Uuid> = employees.iter().map(|e| e.id).collect();
        let mut summary = ProcessingSummary {
            total_employees: employees.len() as u32,
            ..ProcessingSummary::default()
        };

        info!(
            period_id = %period.id,
            employees = employees.len(),
            worker_limit,
            "Processing period"
        );

        let mut tasks = JoinSet::new();
        for employee in employees {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Storage {
                    message: format!("worker pool closed: {e}"),
                })?;
            let worker = self.clone();
            let period = period.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = worker.process_employee(&period, &employee);
                (employee.id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((employee_id, outcome)) => {
                    pending.remove(&employee_id);
                    record_outcome(&mut summary, outcome);
                }
                Err(error) => warn!(period_id = %period.id, %error, "Employee pipeline aborted"),
            }
        }

        // Pipelines that panicked never reported back.
        for employee_id in pending {
            record_outcome(
                &mut summary,
                EmployeeOutcome::Failed(EmployeeFailure {
                    employee_id,
                    reason: "payroll pipeline aborted".to_string(),
                    kind: ErrorKind::Storage,
                }),
            );
        }

        summary.failures.sort_by_key(|f| f.employee_id);
        info!(
            period_id = %period.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            warnings = summary.warnings,
            "Period processed"
        );
        Ok(summary)
    }

    /// Runs one employee's pipeline and commits the result.
    pub fn process_employee(&self, period: &PayrollPeriod, employee: &Employee) -> EmployeeOutcome {
        let payroll_id = payroll_id(period.id, employee.id);
        let result = self
            .build_commit(period, employee, payroll_id)
            .and_then(|commit| {
                let warnings = commit.payroll.warnings.len();
                let postings = commit.loan_postings.clone();
                self.store.commit_employee_payroll(commit)?;
                for posting in &postings {
                    audit_loan_posting(self.audit.as_ref(), posting, &self.actor);
                }
                Ok(warnings)
            });

        match result {
            Ok(warnings) => {
                debug!(
                    period_id = %period.id,
                    employee_id = %employee.id,
                    warnings,
                    "Payroll calculated"
                );
                EmployeeOutcome::Calculated { warnings }
            }
            Err(error) => {
                EmployeeOutcome::Failed(self.fail_employee(period, employee, payroll_id, error))
            }
        }
    }

    fn build_commit(
        &self,
        period: &PayrollPeriod,
        employee: &Employee,
        payroll_id: Uuid,
    ) -> EngineResult<PayrollCommit> {
        let components = self.store.tenant_components(period.tenant_id)?;
        let assignments = self.store.employee_assignments(employee.id)?;
        let structure = resolve_salary_structure(&components, &assignments, period.end_date);

        let country = if employee.country.trim().is_empty() {
            self.config.settings().default_country.as_str()
        } else {
            employee.country.as_str()
        };
        let rates = self.config.rates_for(country, period.end_date);

        let loans = self.store.employee_loans(employee.id)?;
        let plan = plan_loan_deductions(&loans, period.pay_date);
        let calculation = calculate_employee_payroll(&structure, &rates, &plan);

        if calculation.has_negative_net_pay() {
            return Err(EngineError::NegativeNetPay {
                employee_id: employee.id,
                net_pay: calculation.net_pay,
            });
        }

        let loan_postings = plan
            .iter()
            .map(|deduction| {
                let loan = loans
                    .iter()
                    .find(|l| l.id == deduction.loan_id)
                    .ok_or_else(|| {
                        EngineError::ledger(deduction.loan_id, "planned loan disappeared")
                    })?;
                let (updated_loan, repayment) = book_repayment(
                    loan,
                    RepaymentRequest {
                        repayment_id: repayment_id(payroll_id, loan.id),
                        amount: deduction.amount,
                        date: period.pay_date,
                        repayment_type: RepaymentType::PayrollDeduction,
                        payroll_id: Some(payroll_id),
                        notes: Some(format!("Payroll deduction for {}", period.name)),
                    },
                )?;
                Ok(LoanPosting {
                    previous: loan.clone(),
                    updated_loan,
                    repayment,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let (payroll, items) = calculation.into_payroll(payroll_id, period.id, employee.id);
        Ok(PayrollCommit {
            payroll,
            items,
            loan_postings,
        })
    }

    fn fail_employee(
        &self,
        period: &PayrollPeriod,
        employee: &Employee,
        payroll_id: Uuid,
        error: EngineError,
    ) -> EmployeeFailure {
        let reason = error.to_string();
        let kind = error.kind();
        warn!(
            period_id = %period.id,
            employee_id = %employee.id,
            ?kind,
            %error,
            "Employee payroll failed"
        );

        // A conflict means another writer owns this row; leave it alone.
        if !matches!(
            error,
            EngineError::ConcurrencyConflict { .. } | EngineError::PeriodLocked { .. }
        ) {
            let row = Payroll::failed(
                payroll_id,
                period.id,
                employee.id,
                reason.clone(),
                Vec::<PayrollWarning>::new(),
            );
            let commit = PayrollCommit {
                payroll: row,
                items: vec![],
                loan_postings: vec![],
            };
            if let Err(error) = self.store.commit_employee_payroll(commit) {
                warn!(employee_id = %employee.id, %error, "Could not record failed payroll");
            }
        }

        self.notifier.notify(DomainEvent::EmployeePayrollFailed {
            tenant_id: period.tenant_id,
            period_id: period.id,
            employee_id: employee.id,
            reason: reason.clone(),
            kind,
        });

        EmployeeFailure {
            employee_id: employee.id,
            reason,
            kind,
        }
    }
}

fn record_outcome(summary: &mut ProcessingSummary, outcome: EmployeeOutcome) {
    match outcome {
        EmployeeOutcome::Calculated { warnings } => {
            summary.succeeded += 1;
            summary.warnings += warnings as u32;
        }
        EmployeeOutcome::Failed(failure) => {
            summary.failed += 1;
            summary.failures.push(failure);
        }
    }
}
