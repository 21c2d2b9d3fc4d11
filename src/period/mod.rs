//! The payroll period state machine.
//!
//! ```text
//! draft -> processing -> pending_approval -> approved -> locked
//! pending_approval -> draft          (reopen)
//! approved -> paid -> locked         (mark_paid, lock)
//! ```

mod service;

pub use service::{NewPeriod, PeriodService, PeriodSummary, period_remittances};
