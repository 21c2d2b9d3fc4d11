//! Configuration types for the payroll engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use serde::{Deserialize, Serialize};

fn default_remittance_due_day() -> u32 {
    9
}

fn default_country() -> String {
    "KE".to_string()
}

/// Engine-wide settings read from `engine.yaml`.
///
/// # Example
///
/// ```
/// use payroll_engine::config::EngineSettings;
///
/// let settings: EngineSettings = serde_yaml::from_str("default_country: UG").unwrap();
/// assert_eq!(settings.default_country, "UG");
/// assert_eq!(settings.remittance_due_day, 9);
/// assert!(!settings.allow_approval_with_failures);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum employees calculated concurrently within one period.
    ///
    /// When unset, the limit is derived from the available parallelism.
    #[serde(default)]
    pub worker_pool_limit: Option<usize>,
    /// Day of the month after the period end on which remittances fall due.
    #[serde(default = "default_remittance_due_day")]
    pub remittance_due_day: u32,
    /// Allow a period with failed payrolls to be approved.
    #[serde(default)]
    pub allow_approval_with_failures: bool,
    /// Country used for employees without one.
    #[serde(default = "default_country")]
    pub default_country: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            worker_pool_limit: None,
            remittance_due_day: default_remittance_due_day(),
            allow_approval_with_failures: false,
            default_country: default_country(),
        }
    }
}

impl EngineSettings {
    /// The worker limit to use for a run of `employee_count` employees.
    ///
    /// Never zero, never more than the number of employees (minimum one).
    pub fn effective_worker_limit(&self, employee_count: usize) -> usize {
        let configured = self.worker_pool_limit.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 4)
                .unwrap_or(4)
        });
        configured.max(1).min(employee_count.max(1))
    }
}
