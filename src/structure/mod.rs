//! Salary structure administration.

mod service;

pub use service::{NewAssignment, SalaryStructureService};
