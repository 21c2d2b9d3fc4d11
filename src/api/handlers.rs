//! HTTP request handlers for the period endpoints.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;

use super::request::{CreatePeriodRequest, MarkPaidRequest};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

/// Header naming the user behind a request; recorded on audit entries.
pub const ACTOR_HEADER: &str = "x-actor";

const DEFAULT_ACTOR: &str = "api";

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/periods", post(create_period_handler))
        .route("/periods/:id", get(period_summary_handler))
        .route("/periods/:id/process", post(process_handler))
        .route("/periods/:id/approve", post(approve_handler))
        .route("/periods/:id/mark-paid", post(mark_paid_handler))
        .route("/periods/:id/lock", post(lock_handler))
        .route("/periods/:id/reopen", post(reopen_handler))
        .route("/periods/:id/payrolls", get(payrolls_handler))
        .route("/payrolls/:id/items", get(payroll_items_handler))
        .with_state(state)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], Json(body)).into_response()
}

fn error_response(error: ApiErrorResponse) -> Response {
    json_response(error.status, error.error)
}

fn respond<T: Serialize>(status: StatusCode, result: EngineResult<T>) -> Response {
    match result {
        Ok(body) => json_response(status, body),
        Err(err) => {
            warn!(error = %err, kind = ?err.kind(), "Request failed");
            error_response(err.into())
        }
    }
}

fn bad_request(error: ApiError) -> Response {
    json_response(StatusCode::BAD_REQUEST, error)
}

fn json_rejection(rejection: JsonRejection) -> Response {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::new("VALIDATION_ERROR", body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    bad_request(error)
}

fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, Response> {
    path.map(|Path(id)| id).map_err(|rejection| {
        bad_request(ApiError::with_details(
            "INVALID_ID",
            "Path id must be a UUID",
            rejection.body_text(),
        ))
    })
}

fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}

/// Handler for `POST /periods`.
async fn create_period_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreatePeriodRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(rejection),
    };
    info!(tenant_id = %request.tenant_id, name = %request.name, "Creating period");
    respond(
        StatusCode::CREATED,
        state.periods().create_period(request.into()),
    )
}

/// Handler for `GET /periods/:id`.
async fn period_summary_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().summary(id)),
        Err(response) => response,
    }
}

/// Handler for `POST /periods/:id/process`.
async fn process_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = actor(&headers);
    info!(period_id = %id, %actor, "Processing period");
    respond(StatusCode::OK, state.periods().process(id, &actor).await)
}

/// Handler for `POST /periods/:id/approve`.
async fn approve_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().approve(id, &actor(&headers))),
        Err(response) => response,
    }
}

/// Handler for `POST /periods/:id/mark-paid`.
async fn mark_paid_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MarkPaidRequest>, JsonRejection>,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection(rejection),
    };
    respond(
        StatusCode::OK,
        state
            .periods()
            .mark_paid(id, request.into(), &actor(&headers)),
    )
}

/// Handler for `POST /periods/:id/lock`.
async fn lock_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().lock(id, &actor(&headers))),
        Err(response) => response,
    }
}

/// Handler for `POST /periods/:id/reopen`.
async fn reopen_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().reopen(id, &actor(&headers))),
        Err(response) => response,
    }
}

/// Handler for `GET /periods/:id/payrolls`.
async fn payrolls_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().payrolls(id)),
        Err(response) => response,
    }
}

/// Handler for `GET /payrolls/:id/items`.
async fn payroll_items_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    match path_id(path) {
        Ok(id) => respond(StatusCode::OK, state.periods().payroll_items(id)),
        Err(response) => response,
    }
}
