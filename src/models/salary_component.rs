//! Salary component definitions and their per-employee assignments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RateType;

/// Whether a component adds to or subtracts from pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Adds to gross pay.
    Earning,
    /// Subtracted from gross pay.
    Deduction,
}

/// Reporting category of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Basic salary.
    Basic,
    /// Recurring allowance (housing, transport, ...).
    Allowance,
    /// One-off or periodic bonus.
    Bonus,
    /// Non-cash benefit valued for tax.
    Benefit,
    /// Government-mandated withholding computed by the engine.
    Statutory,
    /// Loan repayment computed by the engine.
    Loan,
    /// Any other fixed deduction (SACCO, union dues, ...).
    OtherDeduction,
}

/// How a component's amount is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalculationMode {
    /// The assignment amount is the component amount.
    Fixed,
    /// The assignment amount is a percentage of another (fixed) component.
    PercentageOf {
        /// The component the percentage is taken from.
        base_component_id: Uuid,
    },
}

/// A tenant-scoped salary component definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryComponent {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Display name (e.g., "Housing Allowance").
    pub name: String,
    /// Code, unique per tenant (e.g., "HOUSING").
    pub code: String,
    /// Earning or deduction.
    pub kind: ComponentKind,
    /// Reporting category.
    pub category: ComponentCategory,
    /// Fixed or percentage-of-another-component.
    pub calculation: CalculationMode,
    /// Whether the earning counts toward taxable income.
    pub is_taxable: bool,
    /// Set when the component stands for a statutory deduction.
    #[serde(default)]
    pub statutory_type: Option<RateType>,
    /// Inactive components are ignored by the resolver.
    pub is_active: bool,
}

impl SalaryComponent {
    /// Returns true if the component is a statutory line.
    pub fn is_statutory(&self) -> bool {
        self.statutory_type.is_some()
    }

    /// Returns the referenced base component, if percentage-based.
    pub fn base_component_id(&self) -> Option<Uuid> {
        match self.calculation {
            CalculationMode::Fixed => None,
            CalculationMode::PercentageOf { base_component_id } => Some(base_component_id),
        }
    }
}

/// A component assigned to an employee over `[effective_from, effective_to)`.
///
/// Assignment history is append-only: a revision closes the previous row by
/// setting its `effective_to` and adds a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSalaryComponent {
    /// Unique identifier.
    pub id: Uuid,
    /// The employee.
    pub employee_id: Uuid,
    /// The component definition.
    pub component_id: Uuid,
    /// Monetary amount, or the percentage for percentage-mode components.
    pub amount: Decimal,
    /// First day the assignment applies.
    pub effective_from: NaiveDate,
    /// First day the assignment no longer applies; `None` is open-ended.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}

impl EmployeeSalaryComponent {
    /// Checks whether the assignment covers `date`.
    ///
    /// ```
    /// use payroll_engine::models::EmployeeSalaryComponent;
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    /// use uuid::Uuid;
    ///
    /// let assignment = EmployeeSalaryComponent {
    ///     id: Uuid::new_v4(),
    ///     employee_id: Uuid::new_v4(),
    ///     component_id: Uuid::new_v4(),
    ///     amount: Decimal::from(50_000),
    ///     effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    ///     effective_to: NaiveDate::from_ymd_opt(2025, 7, 1),
    /// };
    /// assert!(assignment.is_effective_on(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
    /// assert!(!assignment.is_effective_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    /// ```
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date < to)
    }

    /// Returns true if the two assignments share at least one day.
    pub fn overlaps(&self, other: &EmployeeSalaryComponent) -> bool {
        let self_before_other_ends = other.effective_to.is_none_or(|to| self.effective_from < to);
        let other_before_self_ends = self.effective_to.is_none_or(|to| other.effective_from < to);
        self_before_other_ends && other_before_self_ends
    }
}
