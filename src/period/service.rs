//! Payroll period lifecycle.
//!
//! Every mutating operation takes the period's advisory lock, re-reads the
//! period, checks the status guard and moves the status with a
//! compare-and-swap. Status changes are audited and announced to the
//! notification sink after they land.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::{
    AuditEntry, AuditSink, DomainEvent, EmployeeDirectory, InMemoryRemittanceSink,
    NotificationSink, RemittanceSink, TracingAuditSink, TracingNotifier, record_best_effort,
};
use crate::config::ConfigLoader;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{audit_loan_balance, reverse_repayment};
use crate::models::{
    PaymentDetails, Payroll, PayrollItem, PayrollPeriod, PayrollStatus, PeriodStatus,
    PeriodTotals, ProcessingSummary, RateType, Remittance, remittance_due_date,
};
use crate::processing::PayrollOrchestrator;
use crate::store::{PayrollStore, PeriodLockGuard};

const PERIOD_ENTITY: &str = "payroll_period";

/// A request to open a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPeriod {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
    /// First day (inclusive).
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    pub end_date: NaiveDate,
    /// Pay date.
    pub pay_date: NaiveDate,
}

/// What a period looks like right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// The period, with its cached totals.
    pub period: PayrollPeriod,
    /// Totals recomputed from the payroll rows.
    pub totals: PeriodTotals,
    /// True when the cached totals disagree with `totals`.
    pub totals_stale: bool,
    /// Payroll rows in status failed.
    pub failed_payrolls: u32,
    /// Outcome of the most recent processing run.
    pub last_run: Option<ProcessingSummary>,
}

/// Remittances owed for a period: one per statutory deduction with a
/// non-zero total over the successfully calculated payrolls.
pub fn period_remittances(
    period: &PayrollPeriod,
    payrolls: &[Payroll],
    due_day: u32,
) -> EngineResult<Vec<Remittance>> {
    let due_date = remittance_due_date(period.end_date, due_day)?;
    let counted = || payrolls.iter().filter(|p| p.status != PayrollStatus::Failed);

    Ok([
        (RateType::Paye, counted().map(|p| p.paye).sum::<Decimal>()),
        (RateType::Pension, counted().map(|p| p.pension).sum::<Decimal>()),
        (RateType::Health, counted().map(|p| p.health).sum::<Decimal>()),
    ]
    .into_iter()
    .filter(|(_, amount)| !amount.is_zero())
    .map(|(tax_type, amount)| Remittance {
        period_id: period.id,
        tax_type,
        amount,
        due_date,
    })
    .collect())
}

fn guard_status(
    period: &PayrollPeriod,
    allowed: bool,
    action: &'static str,
) -> EngineResult<()> {
    if period.status == PeriodStatus::Locked {
        return Err(EngineError::PeriodLocked {
            period_id: period.id,
        });
    }
    if !allowed {
        return Err(EngineError::InvalidTransition {
            period_id: period.id,
            status: period.status,
            action,
        });
    }
    Ok(())
}

/// Owns period status transitions and the totals derived from payroll rows.
pub struct PeriodService {
    store: Arc<dyn PayrollStore>,
    config: Arc<ConfigLoader>,
    directory: Arc<dyn EmployeeDirectory>,
    remittances: Arc<dyn RemittanceSink>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl PeriodService {
    /// Creates a service with in-memory remittances and tracing-backed
    /// notification and audit sinks.
    pub fn new(
        store: Arc<dyn PayrollStore>,
        config: Arc<ConfigLoader>,
        directory: Arc<dyn EmployeeDirectory>,
    ) -> Self {
        Self {
            store,
            config,
            directory,
            remittances: Arc::new(InMemoryRemittanceSink::new()),
            notifier: Arc::new(TracingNotifier),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replaces the remittance sink.
    pub fn with_remittance_sink(mut self, remittances: Arc<dyn RemittanceSink>) -> Self {
        self.remittances = remittances;
        self
    }

    /// Replaces the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn PayrollStore> {
        &self.store
    }

    /// Opens a draft period.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if the dates are out of order
    /// - [`EngineError::PeriodOverlap`] if the tenant already has a period on any of its days
    pub fn create_period(&self, request: NewPeriod) -> EngineResult<PayrollPeriod> {
        if request.name.trim().is_empty() {
            return Err(EngineError::validation("Period name must not be empty"));
        }
        if request.end_date < request.start_date {
            return Err(EngineError::validation(format!(
                "Period ends ({}) before it starts ({})",
                request.end_date, request.start_date
            )));
        }
        if request.pay_date < request.start_date {
            return Err(EngineError::validation(format!(
                "Pay date {} is before the period start {}",
                request.pay_date, request.start_date
            )));
        }

        let period = PayrollPeriod {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            name: request.name.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            pay_date: request.pay_date,
            status: PeriodStatus::Draft,
            totals: PeriodTotals::default(),
            last_run: None,
            created_at: Utc::now(),
        };
        self.store.insert_period(period.clone())?;
        info!(
            period_id = %period.id,
            tenant_id = %period.tenant_id,
            start_date = %period.start_date,
            end_date = %period.end_date,
            "Payroll period created"
        );
        Ok(period)
    }

    /// Fetches a period.
    pub fn period(&self, period_id: Uuid) -> EngineResult<PayrollPeriod> {
        self.store.period(period_id)
    }

    /// Calculates every active employee's payroll.
    ///
    /// Allowed from draft, and from processing to resume an interrupted run.
    /// Rows left by an interrupted run are removed and their loan repayments
    /// reversed before the status moves, so a failed reversal leaves the
    /// period where it was.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ConcurrencyConflict`] if another operation holds the
    ///   period, or another period of the tenant is awaiting approval
    /// - [`EngineError::InvalidTransition`] outside draft/processing
    pub async fn process(&self, period_id: Uuid, actor: &str) -> EngineResult<ProcessingSummary> {
        let _guard = PeriodLockGuard::acquire(self.store.as_ref(), period_id)?;
        let period = self.store.period(period_id)?;
        guard_status(&period, period.status.allows_processing(), "process")?;

        if let Some(other) = self
            .store
            .tenant_periods(period.tenant_id)?
            .into_iter()
            .find(|p| p.id != period.id && p.status.has_unsettled_payroll())
        {
            return Err(EngineError::ConcurrencyConflict {
                period_id,
                message: format!(
                    "period {} of this tenant is still {}",
                    other.id, other.status
                ),
            });
        }

        self.clear_payrolls(period_id, actor)?;
        let period = if period.status == PeriodStatus::Draft {
            self.transition(&period, PeriodStatus::Processing, actor)?
        } else {
            period
        };

        let employees = self
            .directory
            .active_employees(period.tenant_id, period.end_date)?;
        let orchestrator = PayrollOrchestrator::new(
            self.store.clone(),
            self.config.clone(),
            self.notifier.clone(),
            self.audit.clone(),
            actor,
        );
        let summary = orchestrator.run(&period, employees).await?;

        let totals = PeriodTotals::from_payrolls(&self.store.period_payrolls(period_id)?);
        self.store
            .save_period_results(period_id, totals, Some(summary.clone()))?;
        self.transition(&period, PeriodStatus::PendingApproval, actor)?;

        self.notifier.notify(DomainEvent::PeriodProcessed {
            tenant_id: period.tenant_id,
            period_id,
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Approves a processed period.
    ///
    /// # Errors
    ///
    /// - [`EngineError::StaleTotals`] if the cached totals disagreed with the
    ///   payroll rows; they are refreshed and the call may be retried
    /// - [`EngineError::Validation`] if failed payrolls remain and the
    ///   settings do not allow approving around them
    pub fn approve(&self, period_id: Uuid, actor: &str) -> EngineResult<PayrollPeriod> {
        let _guard = PeriodLockGuard::acquire(self.store.as_ref(), period_id)?;
        let period = self.store.period(period_id)?;
        guard_status(
            &period,
            period.status == PeriodStatus::PendingApproval,
            "approve",
        )?;

        let payrolls = self.store.period_payrolls(period_id)?;
        let totals = PeriodTotals::from_payrolls(&payrolls);
        if totals != period.totals {
            warn!(
                %period_id,
                cached_net = %period.totals.total_net,
                actual_net = %totals.total_net,
                "Cached totals were stale"
            );
            self.store.save_period_results(period_id, totals, None)?;
            return Err(EngineError::StaleTotals { period_id });
        }

        let failed = payrolls
            .iter()
            .filter(|p| p.status == PayrollStatus::Failed)
            .count();
        if failed > 0 && !self.config.settings().allow_approval_with_failures {
            return Err(EngineError::validation(format!(
                "{} payroll(s) failed; resolve and reprocess before approving",
                failed
            )));
        }

        let approved = self.transition(&period, PeriodStatus::Approved, actor)?;
        self.store.set_payroll_status(
            period_id,
            PayrollStatus::Calculated,
            PayrollStatus::Approved,
            None,
        )?;

        self.notifier.notify(DomainEvent::PeriodApproved {
            tenant_id: period.tenant_id,
            period_id,
            totals: approved.totals.clone(),
        });
        Ok(approved)
    }

    /// Records disbursement of an approved period.
    pub fn mark_paid(
        &self,
        period_id: Uuid,
        payment: PaymentDetails,
        actor: &str,
    ) -> EngineResult<PayrollPeriod> {
        if payment.reference.trim().is_empty() {
            return Err(EngineError::validation("A payment reference is required"));
        }

        let _guard = PeriodLockGuard::acquire(self.store.as_ref(), period_id)?;
        let period = self.store.period(period_id)?;
        guard_status(&period, period.status == PeriodStatus::Approved, "mark paid")?;

        let paid = self.transition(&period, PeriodStatus::Paid, actor)?;
        let rows = self.store.set_payroll_status(
            period_id,
            PayrollStatus::Approved,
            PayrollStatus::Paid,
            Some(payment.clone()),
        )?;
        info!(%period_id, payrolls = rows, reference = %payment.reference, "Period paid");

        self.notifier.notify(DomainEvent::PeriodPaid {
            tenant_id: period.tenant_id,
            period_id,
            reference: payment.reference,
        });
        Ok(paid)
    }

    /// Locks an approved or paid period and records its remittances.
    ///
    /// Locking an already locked period is a no-op. Remittances are upserts
    /// keyed by (period, tax type), so a lock retried after a partial failure
    /// never duplicates them.
    pub fn lock(&self, period_id: Uuid, actor: &str) -> EngineResult<PayrollPeriod> {
        let period = self.store.period(period_id)?;
        if period.status == PeriodStatus::Locked {
            info!(%period_id, "Period already locked");
            return Ok(period);
        }

        let _guard = PeriodLockGuard::acquire(self.store.as_ref(), period_id)?;
        let period = self.store.period(period_id)?;
        if period.status == PeriodStatus::Locked {
            return Ok(period);
        }
        guard_status(&period, period.status.allows_locking(), "lock")?;

        let payrolls = self.store.period_payrolls(period_id)?;
        let remittances = period_remittances(
            &period,
            &payrolls,
            self.config.settings().remittance_due_day,
        )?;

        self.store.freeze_period(period_id)?;
        for remittance in &remittances {
            self.remittances.record_remittance(remittance)?;
        }

        let locked = self.transition(&period, PeriodStatus::Locked, actor)?;
        info!(%period_id, remittances = remittances.len(), "Period locked");

        self.notifier.notify(DomainEvent::PeriodLocked {
            tenant_id: period.tenant_id,
            period_id,
            remittances,
        });
        Ok(locked)
    }

    /// Sends a period awaiting approval back to draft for correction.
    ///
    /// Its payroll rows are removed and their loan repayments reversed, so a
    /// draft period never holds deductions that other periods could build on.
    /// If a reversal fails nothing changes and the period stays pending.
    pub fn reopen(&self, period_id: Uuid, actor: &str) -> EngineResult<PayrollPeriod> {
        let _guard = PeriodLockGuard::acquire(self.store.as_ref(), period_id)?;
        let period = self.store.period(period_id)?;
        guard_status(
            &period,
            period.status == PeriodStatus::PendingApproval,
            "reopen",
        )?;

        self.clear_payrolls(period_id, actor)?;
        self.store
            .save_period_results(period_id, PeriodTotals::default(), None)?;
        self.transition(&period, PeriodStatus::Draft, actor)
    }

    /// The period with freshly recomputed totals.
    pub fn summary(&self, period_id: Uuid) -> EngineResult<PeriodSummary> {
        let period = self.store.period(period_id)?;
        let payrolls = self.store.period_payrolls(period_id)?;
        let totals = PeriodTotals::from_payrolls(&payrolls);
        let failed_payrolls = payrolls
            .iter()
            .filter(|p| p.status == PayrollStatus::Failed)
            .count() as u32;

        Ok(PeriodSummary {
            totals_stale: totals != period.totals,
            last_run: period.last_run.clone(),
            period,
            totals,
            failed_payrolls,
        })
    }

    /// Payroll rows of a period, ordered by employee id.
    pub fn payrolls(&self, period_id: Uuid) -> EngineResult<Vec<Payroll>> {
        self.store.period(period_id)?;
        self.store.period_payrolls(period_id)
    }

    /// Line items of one payroll.
    pub fn payroll_items(&self, payroll_id: Uuid) -> EngineResult<Vec<PayrollItem>> {
        self.store.payroll_items(payroll_id)
    }

    fn clear_payrolls(&self, period_id: Uuid, actor: &str) -> EngineResult<()> {
        let reset = self
            .store
            .reset_period_payrolls(period_id, &reverse_repayment)?;
        for (old_balance, loan) in &reset.reversed_loans {
            audit_loan_balance(
                self.audit.as_ref(),
                loan.id,
                *old_balance,
                loan.remaining_balance,
                actor,
            );
        }
        if reset.payrolls_removed > 0 {
            info!(
                %period_id,
                payrolls_removed = reset.payrolls_removed,
                loans_restored = reset.reversed_loans.len(),
                "Cleared payroll rows"
            );
        }
        Ok(())
    }

    fn transition(
        &self,
        period: &PayrollPeriod,
        next: PeriodStatus,
        actor: &str,
    ) -> EngineResult<PayrollPeriod> {
        let updated = self.store.transition_period(period.id, period.status, next)?;
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::change(
                PERIOD_ENTITY,
                period.id,
                "status",
                period.status,
                next,
                actor,
            ),
        );
        info!(
            period_id = %period.id,
            from = %period.status,
            to = %next,
            "Period status changed"
        );
        Ok(updated)
    }
}
