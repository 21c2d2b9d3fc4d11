//! Batch processing of a period's employees.

mod orchestrator;

pub use orchestrator::{EmployeeOutcome, PayrollOrchestrator, payroll_id, repayment_id};
