//! Core data models for the payroll engine.
//!
//! This module contains the configuration records (components, statutory
//! rates), the loan ledger rows, and the period/payroll rows produced by
//! processing.

mod employee;
mod loan;
mod payroll;
mod payroll_period;
mod remittance;
mod salary_component;
mod statutory_rate;

pub use employee::Employee;
pub use loan::{EmployeeLoan, LoanRepayment, LoanStatus, RepaymentType};
pub use payroll::{
    MISSING_BASE_COMPONENT, MISSING_STATUTORY_CONFIG, PaymentDetails, PaymentMethod, Payroll,
    PayrollItem, PayrollStatus, PayrollWarning, UNKNOWN_COMPONENT,
};
pub use payroll_period::{
    EmployeeFailure, PayrollPeriod, PeriodStatus, PeriodTotals, ProcessingSummary,
};
pub use remittance::{Remittance, remittance_due_date};
pub use salary_component::{
    CalculationMode, ComponentCategory, ComponentKind, EmployeeSalaryComponent, SalaryComponent,
};
pub use statutory_rate::{
    HealthConfig, HealthTier, PayeConfig, PensionConfig, RateType, StatutoryConfig,
    StatutoryRate, TaxBracket,
};
