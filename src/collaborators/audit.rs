//! Field-level audit trail.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;

/// One recorded field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Kind of entity changed (`payroll_period`, `employee_loan`, ...).
    pub entity_type: String,
    /// The entity.
    pub entity_id: Uuid,
    /// Field that changed.
    pub field: String,
    /// Previous value, if any.
    pub old_value: Option<String>,
    /// New value, if any.
    pub new_value: Option<String>,
    /// Who made the change.
    pub actor: String,
}

impl AuditEntry {
    /// Builds an entry from displayable old and new values.
    pub fn change(
        entity_type: &str,
        entity_id: Uuid,
        field: &str,
        old_value: impl ToString,
        new_value: impl ToString,
        actor: &str,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id,
            field: field.to_string(),
            old_value: Some(old_value.to_string()),
            new_value: Some(new_value.to_string()),
            actor: actor.to_string(),
        }
    }
}

/// Receives field changes for status transitions and loan balances.
pub trait AuditSink: Send + Sync {
    /// Records one change.
    fn record_field_change(&self, entry: AuditEntry) -> EngineResult<()>;
}

/// Records `entry`, logging instead of failing when the sink errors.
pub fn record_best_effort(sink: &dyn AuditSink, entry: AuditEntry) {
    let entity_id = entry.entity_id;
    let field = entry.field.clone();
    if let Err(error) = sink.record_field_change(entry) {
        warn!(%entity_id, field = %field, %error, "Audit record dropped");
    }
}

/// Writes audit entries as `tracing` events under `payroll_engine::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_field_change(&self, entry: AuditEntry) -> EngineResult<()> {
        info!(
            target: "payroll_engine::audit",
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            field = %entry.field,
            old_value = entry.old_value.as_deref().unwrap_or(""),
            new_value = entry.new_value.as_deref().unwrap_or(""),
            actor = %entry.actor,
            "Field changed"
        );
        Ok(())
    }
}

/// Keeps audit entries in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded so far, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Entries recorded for one entity.
    pub fn entries_for(&self, entity_id: Uuid) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record_field_change(&self, entry: AuditEntry) -> EngineResult<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}
