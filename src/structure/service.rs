//! Salary component registration and employee assignment history.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::calculation::{
    ResolvedStructure, resolve_salary_structure, validate_assignment, validate_component,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{EmployeeSalaryComponent, SalaryComponent};
use crate::store::PayrollStore;

/// A component assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    /// The employee.
    pub employee_id: Uuid,
    /// The component to assign.
    pub component_id: Uuid,
    /// Amount, or percentage for percentage-mode components.
    pub amount: Decimal,
    /// First day the assignment applies.
    pub effective_from: NaiveDate,
    /// First day it no longer applies.
    pub effective_to: Option<NaiveDate>,
}

/// Maintains component definitions and assignment rows.
///
/// All reference and overlap rules are checked here, at write time, so
/// the resolver can trust what it reads.
pub struct SalaryStructureService {
    store: Arc<dyn PayrollStore>,
}

impl SalaryStructureService {
    /// Creates a service over `store`.
    pub fn new(store: Arc<dyn PayrollStore>) -> Self {
        Self { store }
    }

    /// Registers or updates a component definition.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for an empty or duplicate code
    /// - [`EngineError::InvalidPercentageReference`] for self references,
    ///   unknown bases and percentage chains
    pub fn register_component(&self, component: SalaryComponent) -> EngineResult<SalaryComponent> {
        let existing = self.store.tenant_components(component.tenant_id)?;
        validate_component(&component, &existing)?;
        self.store.save_component(component.clone())?;
        info!(
            component_id = %component.id,
            tenant_id = %component.tenant_id,
            code = %component.code,
            "Salary component registered"
        );
        Ok(component)
    }

    /// Assigns a component to an employee.
    pub fn assign_component(
        &self,
        request: NewAssignment,
    ) -> EngineResult<EmployeeSalaryComponent> {
        let component = self.store.component(request.component_id)?;
        let assignment = EmployeeSalaryComponent {
            id: Uuid::new_v4(),
            employee_id: request.employee_id,
            component_id: request.component_id,
            amount: request.amount,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
        };
        let existing = self.store.employee_assignments(request.employee_id)?;
        validate_assignment(&assignment, &component, &existing)?;
        self.store.insert_assignment(assignment.clone())?;
        Ok(assignment)
    }

    /// Changes an employee's amount for a component from `effective_from`.
    ///
    /// The row covering `effective_from` is closed at that date and a new
    /// row carrying the new amount takes over until the old row's end.
    pub fn revise_assignment(
        &self,
        employee_id: Uuid,
        component_id: Uuid,
        effective_from: NaiveDate,
        amount: Decimal,
    ) -> EngineResult<EmployeeSalaryComponent> {
        let component = self.store.component(component_id)?;
        let existing = self.store.employee_assignments(employee_id)?;
        let current = existing
            .iter()
            .find(|row| row.component_id == component_id && row.is_effective_on(effective_from))
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "Component '{}' is not assigned to employee {} on {}",
                    component.code, employee_id, effective_from
                ))
            })?;

        let next = EmployeeSalaryComponent {
            id: Uuid::new_v4(),
            employee_id,
            component_id,
            amount,
            effective_from,
            effective_to: current.effective_to,
        };
        let others: Vec<EmployeeSalaryComponent> = existing
            .iter()
            .filter(|row| row.id != current.id)
            .cloned()
            .collect();
        validate_assignment(&next, &component, &others)?;

        self.store
            .revise_assignment(current.id, effective_from, next.clone())?;
        info!(
            %employee_id,
            code = %component.code,
            %effective_from,
            old_amount = %current.amount,
            new_amount = %amount,
            "Salary component revised"
        );
        Ok(next)
    }

    /// Assignment history of an employee.
    pub fn assignments(&self, employee_id: Uuid) -> EngineResult<Vec<EmployeeSalaryComponent>> {
        self.store.employee_assignments(employee_id)
    }

    /// Resolves an employee's structure on `as_of`.
    pub fn resolve(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
        as_of: NaiveDate,
    ) -> EngineResult<ResolvedStructure> {
        let components = self.store.tenant_components(tenant_id)?;
        let assignments = self.store.employee_assignments(employee_id)?;
        Ok(resolve_salary_structure(&components, &assignments, as_of))
    }
}
