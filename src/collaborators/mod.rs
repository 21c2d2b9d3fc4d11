//! Interfaces to the systems around the payroll core.
//!
//! The engine reads employees from a directory, writes remittance
//! obligations when a period locks, records field changes for audit and
//! publishes domain events. Each concern is a trait with an in-memory
//! implementation suitable for tests and embedding.

mod audit;
mod directory;
mod events;
mod remittance;

pub use audit::{AuditEntry, AuditSink, RecordingAuditSink, TracingAuditSink, record_best_effort};
pub use directory::{EmployeeDirectory, InMemoryDirectory};
pub use events::{ChannelNotifier, DomainEvent, NotificationSink, NotifyResult, TracingNotifier};
pub use remittance::{InMemoryRemittanceSink, RemittanceSink};
