//! Calculation logic for the payroll engine.
//!
//! Everything in this module is pure: statutory deductions (PAYE, pension,
//! health), salary structure resolution, loan installment planning and the
//! per-employee pipeline that combines them.

mod employee_payroll;
mod health;
mod loan_deduction;
mod paye;
mod pension;
mod rounding;
mod salary_structure;
mod statutory;

pub use employee_payroll::{
    EmployeePayrollCalculation, ItemDraft, calculate_employee_payroll, item_id,
};
pub use health::{HealthResult, compute_health_contribution};
pub use loan_deduction::{LoanDeduction, plan_loan_deductions};
pub use paye::{BracketPortion, PayeResult, compute_paye};
pub use pension::{PensionResult, compute_pension_contribution};
pub use rounding::{MONEY_SCALE, percentage_of, round_money};
pub use salary_structure::{
    ResolvedComponent, ResolvedStructure, resolve_salary_structure, validate_assignment,
    validate_component,
};
pub use statutory::{
    ResolvedStatutoryRates, StatutoryDeductions, StatutoryLine, compute_statutory_deductions,
};
