//! Domain events published to the notification transport.
//!
//! Publishing never blocks the period transaction: events are handed to a
//! bounded channel with `try_send` and dropped (with a warning) when the
//! consumer falls behind.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::models::{PeriodTotals, ProcessingSummary, Remittance};

/// Something that happened to a period or one of its payrolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A processing run finished and the period awaits approval.
    PeriodProcessed {
        /// Owning tenant.
        tenant_id: Uuid,
        /// The period.
        period_id: Uuid,
        /// Outcome of the run.
        summary: ProcessingSummary,
    },
    /// The period was approved.
    PeriodApproved {
        /// Owning tenant.
        tenant_id: Uuid,
        /// The period.
        period_id: Uuid,
        /// Verified totals.
        totals: PeriodTotals,
    },
    /// Net pay was disbursed.
    PeriodPaid {
        /// Owning tenant.
        tenant_id: Uuid,
        /// The period.
        period_id: Uuid,
        /// Disbursement reference.
        reference: String,
    },
    /// The period was locked and remittances emitted.
    PeriodLocked {
        /// Owning tenant.
        tenant_id: Uuid,
        /// The period.
        period_id: Uuid,
        /// Remittances recorded.
        remittances: Vec<Remittance>,
    },
    /// One employee's payroll could not be calculated.
    EmployeePayrollFailed {
        /// Owning tenant.
        tenant_id: Uuid,
        /// The period.
        period_id: Uuid,
        /// The employee.
        employee_id: Uuid,
        /// Why it failed.
        reason: String,
        /// Taxonomy bucket.
        kind: ErrorKind,
    },
}

impl DomainEvent {
    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::PeriodProcessed { .. } => "period_processed",
            DomainEvent::PeriodApproved { .. } => "period_approved",
            DomainEvent::PeriodPaid { .. } => "period_paid",
            DomainEvent::PeriodLocked { .. } => "period_locked",
            DomainEvent::EmployeePayrollFailed { .. } => "employee_payroll_failed",
        }
    }

    /// The period the event concerns.
    pub fn period_id(&self) -> Uuid {
        match self {
            DomainEvent::PeriodProcessed { period_id, .. }
            | DomainEvent::PeriodApproved { period_id, .. }
            | DomainEvent::PeriodPaid { period_id, .. }
            | DomainEvent::PeriodLocked { period_id, .. }
            | DomainEvent::EmployeePayrollFailed { period_id, .. } => *period_id,
        }
    }
}

/// Result of a non-blocking publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// Queued for delivery.
    Sent,
    /// The buffer was full; the event was dropped.
    BufferFull,
    /// Nobody is listening; the event was dropped.
    Disconnected,
}

/// Fire-and-forget event publisher.
///
/// Implementations must return immediately.
pub trait NotificationSink: Send + Sync {
    /// Publishes one event.
    fn notify(&self, event: DomainEvent) -> NotifyResult;
}

/// Publishes events onto a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<DomainEvent>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver delivery workers drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, event: DomainEvent) -> NotifyResult {
        let name = event.name();
        let period_id = event.period_id();
        match self.sender.try_send(event) {
            Ok(()) => {
                debug!(event = name, %period_id, "Event published");
                NotifyResult::Sent
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event = name, %period_id, "Notification buffer full; event dropped");
                NotifyResult::BufferFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(event = name, %period_id, "No notification consumer; event dropped");
                NotifyResult::Disconnected
            }
        }
    }
}

/// Logs events instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: DomainEvent) -> NotifyResult {
        info!(
            target: "payroll_engine::events",
            event = event.name(),
            period_id = %event.period_id(),
            "Domain event"
        );
        NotifyResult::Sent
    }
}
