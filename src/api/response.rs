//! Error responses for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

fn error_code(error: &EngineError) -> &'static str {
    match error {
        EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
            "CONFIG_ERROR"
        }
        EngineError::MissingStatutoryRate { .. } => "MISSING_STATUTORY_RATE",
        EngineError::Validation { .. } => "VALIDATION_ERROR",
        EngineError::PeriodOverlap { .. } => "PERIOD_OVERLAP",
        EngineError::InvalidPercentageReference { .. } => "INVALID_PERCENTAGE_REFERENCE",
        EngineError::NegativeNetPay { .. } => "NEGATIVE_NET_PAY",
        EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
        EngineError::PeriodLocked { .. } => "PERIOD_LOCKED",
        EngineError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
        EngineError::StaleTotals { .. } => "STALE_TOTALS",
        EngineError::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
        EngineError::NotFound { .. } => "NOT_FOUND",
        EngineError::Storage { .. } => "STORAGE_ERROR",
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let code = error_code(&error);
        let status = match (&error, error.kind()) {
            (EngineError::InvalidTransition { .. } | EngineError::PeriodLocked { .. }, _) => {
                StatusCode::CONFLICT
            }
            (_, ErrorKind::ConcurrencyConflict) => StatusCode::CONFLICT,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::ValidationFailure | ErrorKind::ConfigurationGap) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            (_, ErrorKind::Configuration | ErrorKind::LedgerInconsistency | ErrorKind::Storage) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error = if error.is_retryable() {
            ApiError::with_details(code, error.to_string(), "The operation may be retried")
        } else {
            ApiError::new(code, error.to_string())
        };
        ApiErrorResponse { status, error }
    }
}
