//! Employee directory record.
//!
//! Employees are owned by the external directory; the engine only reads the
//! fields it needs to select who is paid and which country's statutory rates
//! apply.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An employee as returned by the employee directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Human-facing employee number (e.g., "EMP-0042").
    pub employee_number: String,
    /// Display name.
    pub full_name: String,
    /// ISO country code used to resolve statutory rates (e.g., "KE").
    pub country: String,
    /// The date the employee started employment.
    pub hire_date: NaiveDate,
    /// Last working day, if the employee has left.
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    /// Whether the directory considers the employee active.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Employee {
    /// Returns true if the employee should be paid for a period ending on `as_of`.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::models::Employee;
    /// use chrono::NaiveDate;
    /// use uuid::Uuid;
    ///
    /// let employee = Employee {
    ///     id: Uuid::new_v4(),
    ///     tenant_id: Uuid::new_v4(),
    ///     employee_number: "EMP-001".to_string(),
    ///     full_name: "Wanjiru Kamau".to_string(),
    ///     country: "KE".to_string(),
    ///     hire_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
    ///     termination_date: None,
    ///     is_active: true,
    /// };
    /// assert!(employee.is_active_on(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
    /// assert!(!employee.is_active_on(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()));
    /// ```
    pub fn is_active_on(&self, as_of: NaiveDate) -> bool {
        self.is_active
            && self.hire_date <= as_of
            && self.termination_date.is_none_or(|left| left >= as_of)
    }
}
