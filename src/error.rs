//! Error types for the payroll engine.
//!
//! Every failure the engine can surface is a variant of [`EngineError`].
//! Variants are grouped into the [`ErrorKind`] taxonomy so callers can decide
//! between retrying, correcting input, or escalating a data integrity defect.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::PeriodStatus;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or ambiguous statutory rate or salary component.
    ConfigurationGap,
    /// Input rejected for a single employee or period.
    ValidationFailure,
    /// A status guard or advisory lock failed; safe to retry.
    ConcurrencyConflict,
    /// Loan ledger arithmetic or reversal is inconsistent.
    LedgerInconsistency,
    /// A referenced entity does not exist.
    NotFound,
    /// Configuration files could not be loaded.
    Configuration,
    /// The backing store failed.
    Storage,
}

/// The main error type for the payroll engine.
///
/// # Example
///
/// ```
/// use payroll_engine::error::{EngineError, ErrorKind};
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// assert_eq!(error.kind(), ErrorKind::Configuration);
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A statutory rate could not be resolved unambiguously.
    #[error("No statutory {rate_type} rate configured for country '{country}' on {date}")]
    MissingStatutoryRate {
        /// Country code the lookup was made for.
        country: String,
        /// Rate type that was requested.
        rate_type: String,
        /// Calculation date.
        date: NaiveDate,
    },

    /// Generic validation failure.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was invalid.
        message: String,
    },

    /// A new period overlaps an existing period of the same tenant.
    #[error("Period {start_date}..{end_date} overlaps existing period {existing_period_id}")]
    PeriodOverlap {
        /// The period that is already stored.
        existing_period_id: Uuid,
        /// Start of the rejected range.
        start_date: NaiveDate,
        /// End of the rejected range.
        end_date: NaiveDate,
    },

    /// A percentage component references itself or another percentage component.
    #[error("Component '{component_code}' has an invalid percentage reference: {message}")]
    InvalidPercentageReference {
        /// Code of the offending component.
        component_code: String,
        /// Why the reference was rejected.
        message: String,
    },

    /// An employee's deductions exceed their earnings.
    #[error("Negative net pay {net_pay} for employee {employee_id}")]
    NegativeNetPay {
        /// The employee whose payroll failed.
        employee_id: Uuid,
        /// The computed (negative) net pay.
        net_pay: Decimal,
    },

    /// The requested action is not legal from the period's current status.
    #[error("Cannot {action} period {period_id} in status {status}")]
    InvalidTransition {
        /// The period.
        period_id: Uuid,
        /// The status the period is in.
        status: PeriodStatus,
        /// The attempted action.
        action: &'static str,
    },

    /// The period is locked and can no longer change.
    #[error("Period {period_id} is locked")]
    PeriodLocked {
        /// The locked period.
        period_id: Uuid,
    },

    /// A status compare-and-swap or advisory lock failed.
    #[error("Concurrent modification of period {period_id}: {message}")]
    ConcurrencyConflict {
        /// The contended period.
        period_id: Uuid,
        /// What was contended.
        message: String,
    },

    /// Cached totals disagreed with the child payroll rows.
    #[error("Period {period_id} totals were stale and have been refreshed; retry approval")]
    StaleTotals {
        /// The period whose cache was refreshed.
        period_id: Uuid,
    },

    /// Loan ledger arithmetic would break an invariant.
    #[error("Loan ledger inconsistency on loan {loan_id}: {message}")]
    LedgerInconsistency {
        /// The loan involved.
        loan_id: Uuid,
        /// What was inconsistent.
        message: String,
    },

    /// An entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type name.
        entity: &'static str,
        /// The id that was looked up.
        id: Uuid,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },
}

impl EngineError {
    /// Shorthand for [`EngineError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineError::LedgerInconsistency`].
    pub fn ledger(loan_id: Uuid, message: impl Into<String>) -> Self {
        Self::LedgerInconsistency {
            loan_id,
            message: message.into(),
        }
    }

    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ErrorKind::Configuration
            }
            EngineError::MissingStatutoryRate { .. } => ErrorKind::ConfigurationGap,
            EngineError::Validation { .. }
            | EngineError::PeriodOverlap { .. }
            | EngineError::InvalidPercentageReference { .. }
            | EngineError::NegativeNetPay { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::PeriodLocked { .. } => ErrorKind::ValidationFailure,
            EngineError::ConcurrencyConflict { .. } | EngineError::StaleTotals { .. } => {
                ErrorKind::ConcurrencyConflict
            }
            EngineError::LedgerInconsistency { .. } => ErrorKind::LedgerInconsistency,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Returns true if the caller may simply retry the operation.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = EngineError::ConfigParseError {
            path: "/config/bad.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/bad.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_missing_rate_is_configuration_gap() {
        let error = EngineError::MissingStatutoryRate {
            country: "KE".to_string(),
            rate_type: "paye".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "No statutory paye rate configured for country 'KE' on 2025-01-31"
        );
        assert_eq!(error.kind(), ErrorKind::ConfigurationGap);
    }

    #[test]
    fn test_invalid_transition_displays_status() {
        let error = EngineError::InvalidTransition {
            period_id: Uuid::nil(),
            status: PeriodStatus::Draft,
            action: "approve",
        };
        assert_eq!(
            error.to_string(),
            "Cannot approve period 00000000-0000-0000-0000-000000000000 in status draft"
        );
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_only_concurrency_conflicts_are_retryable() {
        let conflict = EngineError::ConcurrencyConflict {
            period_id: Uuid::nil(),
            message: "status changed".to_string(),
        };
        let stale = EngineError::StaleTotals {
            period_id: Uuid::nil(),
        };
        let ledger = EngineError::ledger(Uuid::nil(), "balance below zero");

        assert!(conflict.is_retryable());
        assert!(stale.is_retryable());
        assert!(!ledger.is_retryable());
        assert_eq!(ledger.kind(), ErrorKind::LedgerInconsistency);
    }

    #[test]
    fn test_negative_net_pay_is_validation_failure() {
        let error = EngineError::NegativeNetPay {
            employee_id: Uuid::nil(),
            net_pay: Decimal::new(-1050, 2),
        };
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
        assert!(error.to_string().contains("-10.50"));
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_not_found() -> EngineResult<()> {
            Err(EngineError::NotFound {
                entity: "PayrollPeriod",
                id: Uuid::nil(),
            })
        }

        fn propagates_error() -> EngineResult<()> {
            returns_not_found()?;
            Ok(())
        }

        assert!(matches!(
            propagates_error(),
            Err(EngineError::NotFound { entity: "PayrollPeriod", .. })
        ));
    }
}
