//! Employee directory lookup.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::Employee;

/// Read-only source of employees.
pub trait EmployeeDirectory: Send + Sync {
    /// Employees of `tenant_id` active on `as_of`, ordered by employee number.
    fn active_employees(&self, tenant_id: Uuid, as_of: NaiveDate) -> EngineResult<Vec<Employee>>;
}

/// A directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    employees: RwLock<HashMap<Uuid, Employee>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an employee.
    pub fn upsert(&self, employee: Employee) -> EngineResult<()> {
        if employee.employee_number.trim().is_empty() {
            return Err(EngineError::validation("Employee number must not be empty"));
        }
        self.employees.write().insert(employee.id, employee);
        Ok(())
    }
}

impl EmployeeDirectory for InMemoryDirectory {
    fn active_employees(&self, tenant_id: Uuid, as_of: NaiveDate) -> EngineResult<Vec<Employee>> {
        let employees = self.employees.read();
        let mut active: Vec<Employee> = employees
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.is_active_on(as_of))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.employee_number.cmp(&b.employee_number));
        Ok(active)
    }
}
