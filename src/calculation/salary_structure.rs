//! Salary structure resolution and validation.
//!
//! Resolution is two-tier: fixed components are valued first, then
//! percentage components are applied to the already-valued base. Chains of
//! percentage references are rejected when components are registered, so
//! resolution never recurses.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{percentage_of, round_money};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    CalculationMode, ComponentCategory, ComponentKind, EmployeeSalaryComponent,
    MISSING_BASE_COMPONENT, PayrollWarning, SalaryComponent, UNKNOWN_COMPONENT,
};

/// A component valued for one employee on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedComponent {
    /// The component definition.
    pub component_id: Uuid,
    /// Component code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Earning or deduction.
    pub kind: ComponentKind,
    /// Reporting category.
    pub category: ComponentCategory,
    /// Amount in currency.
    pub amount: Decimal,
    /// Counts toward taxable income.
    pub is_taxable: bool,
    /// Stands for a statutory deduction.
    pub is_statutory: bool,
    /// How the amount was derived.
    pub detail: serde_json::Value,
}

/// The active structure of one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStructure {
    /// Valued components, earnings first, then by code.
    pub lines: Vec<ResolvedComponent>,
    /// Configuration gaps found while resolving.
    pub warnings: Vec<PayrollWarning>,
}

impl ResolvedStructure {
    /// Iterates over earning lines.
    pub fn earnings(&self) -> impl Iterator<Item = &ResolvedComponent> {
        self.lines.iter().filter(|l| l.kind == ComponentKind::Earning)
    }

    /// Iterates over deduction lines that the engine does not compute itself.
    pub fn other_deductions(&self) -> impl Iterator<Item = &ResolvedComponent> {
        self.lines
            .iter()
            .filter(|l| l.kind == ComponentKind::Deduction && !l.is_statutory)
    }
}

/// Resolves the components active for an employee on `as_of`.
///
/// Assignments for unknown or inactive components are skipped with an
/// [`UNKNOWN_COMPONENT`] warning. A percentage component whose base is not
/// assigned resolves to zero with a [`MISSING_BASE_COMPONENT`] warning.
pub fn resolve_salary_structure(
    components: &[SalaryComponent],
    assignments: &[EmployeeSalaryComponent],
    as_of: NaiveDate,
) -> ResolvedStructure {
    let by_id: HashMap<Uuid, &SalaryComponent> = components.iter().map(|c| (c.id, c)).collect();
    let mut warnings = Vec::new();

    // One active row per component; the latest effective_from wins if the
    // history was corrupted by overlapping rows.
    let mut active: HashMap<Uuid, &EmployeeSalaryComponent> = HashMap::new();
    for assignment in assignments.iter().filter(|a| a.is_effective_on(as_of)) {
        match active.get(&assignment.component_id) {
            Some(current) if current.effective_from >= assignment.effective_from => {}
            _ => {
                active.insert(assignment.component_id, assignment);
            }
        }
    }

    let mut fixed: Vec<(&SalaryComponent, &EmployeeSalaryComponent)> = Vec::new();
    let mut percentage: Vec<(&SalaryComponent, &EmployeeSalaryComponent, Uuid)> = Vec::new();

    for assignment in active.values() {
        let Some(component) = by_id.get(&assignment.component_id).filter(|c| c.is_active) else {
            warnings.push(PayrollWarning::new(
                UNKNOWN_COMPONENT,
                format!(
                    "Assignment {} references unknown or inactive component {}",
                    assignment.id, assignment.component_id
                ),
            ));
            continue;
        };
        match component.calculation {
            CalculationMode::Fixed => fixed.push((component, assignment)),
            CalculationMode::PercentageOf { base_component_id } => {
                percentage.push((component, assignment, base_component_id))
            }
        }
    }

    let mut lines = Vec::with_capacity(fixed.len() + percentage.len());
    let mut base_amounts: HashMap<Uuid, Decimal> = HashMap::new();

    for (component, assignment) in fixed {
        let amount = round_money(assignment.amount);
        base_amounts.insert(component.id, amount);
        lines.push(line(
            component,
            amount,
            serde_json::json!({ "mode": "fixed", "amount": amount.to_string() }),
        ));
    }

    for (component, assignment, base_id) in percentage {
        let (amount, detail) = match base_amounts.get(&base_id) {
            Some(base) => (
                percentage_of(*base, assignment.amount),
                serde_json::json!({
                    "mode": "percentage_of",
                    "base_component_id": base_id,
                    "base_amount": base.to_string(),
                    "percentage": assignment.amount.to_string(),
                }),
            ),
            None => {
                warnings.push(PayrollWarning::new(
                    MISSING_BASE_COMPONENT,
                    format!(
                        "Component '{}' is a percentage of {} which is not assigned on {}",
                        component.code, base_id, as_of
                    ),
                ));
                (
                    Decimal::ZERO,
                    serde_json::json!({
                        "mode": "percentage_of",
                        "base_component_id": base_id,
                        "base_amount": null,
                        "percentage": assignment.amount.to_string(),
                    }),
                )
            }
        };
        lines.push(line(component, amount, detail));
    }

    lines.sort_by(|a, b| {
        let rank = |k: ComponentKind| matches!(k, ComponentKind::Deduction);
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then_with(|| a.code.cmp(&b.code))
    });
    warnings.sort_by(|a, b| a.message.cmp(&b.message));

    ResolvedStructure { lines, warnings }
}

fn line(component: &SalaryComponent, amount: Decimal, detail: serde_json::Value) -> ResolvedComponent {
    ResolvedComponent {
        component_id: component.id,
        code: component.code.clone(),
        name: component.name.clone(),
        kind: component.kind,
        category: component.category,
        amount,
        is_taxable: component.is_taxable,
        is_statutory: component.is_statutory(),
        detail,
    }
}

/// Validates a component definition against the tenant's other components.
///
/// Rejects duplicate codes, self references, references to unknown or
/// cross-tenant components, and any percentage chain longer than one hop.
pub fn validate_component(
    component: &SalaryComponent,
    existing: &[SalaryComponent],
) -> EngineResult<()> {
    if component.code.trim().is_empty() {
        return Err(EngineError::validation("Component code must not be empty"));
    }

    let others: Vec<&SalaryComponent> = existing
        .iter()
        .filter(|c| c.tenant_id == component.tenant_id && c.id != component.id)
        .collect();

    if others
        .iter()
        .any(|c| c.code.eq_ignore_ascii_case(&component.code))
    {
        return Err(EngineError::validation(format!(
            "Component code '{}' already exists for this tenant",
            component.code
        )));
    }

    let invalid = |message: String| EngineError::InvalidPercentageReference {
        component_code: component.code.clone(),
        message,
    };

    if let Some(base_id) = component.base_component_id() {
        if base_id == component.id {
            return Err(invalid("a component cannot be a percentage of itself".to_string()));
        }
        let base = others
            .iter()
            .find(|c| c.id == base_id)
            .ok_or_else(|| invalid(format!("base component {} does not exist", base_id)))?;
        if base.base_component_id().is_some() {
            return Err(invalid(format!(
                "base component '{}' is itself percentage-based",
                base.code
            )));
        }
        if let Some(dependent) = others
            .iter()
            .find(|c| c.base_component_id() == Some(component.id))
        {
            return Err(invalid(format!(
                "component '{}' already uses it as a base",
                dependent.code
            )));
        }
    }

    Ok(())
}

/// Validates a new assignment against the employee's existing rows.
pub fn validate_assignment(
    assignment: &EmployeeSalaryComponent,
    component: &SalaryComponent,
    existing: &[EmployeeSalaryComponent],
) -> EngineResult<()> {
    if !component.is_active {
        return Err(EngineError::validation(format!(
            "Component '{}' is inactive",
            component.code
        )));
    }
    if assignment.amount < Decimal::ZERO {
        return Err(EngineError::validation("Assignment amount must not be negative"));
    }
    if component.base_component_id().is_some() && assignment.amount > Decimal::ONE_HUNDRED {
        return Err(EngineError::validation(format!(
            "Percentage for '{}' must be between 0 and 100",
            component.code
        )));
    }
    if assignment
        .effective_to
        .is_some_and(|to| to <= assignment.effective_from)
    {
        return Err(EngineError::validation(
            "Assignment must end after it starts",
        ));
    }
    if let Some(clash) = existing.iter().find(|row| {
        row.id != assignment.id
            && row.employee_id == assignment.employee_id
            && row.component_id == assignment.component_id
            && row.overlaps(assignment)
    }) {
        return Err(EngineError::validation(format!(
            "Component '{}' is already assigned from {} for this employee",
            component.code, clash.effective_from
        )));
    }
    Ok(())
}
