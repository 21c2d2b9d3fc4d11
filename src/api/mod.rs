//! HTTP API over the period service.
//!
//! A thin axum surface: handlers translate JSON to service calls and map
//! [`EngineError`](crate::error::EngineError) kinds to status codes.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::{ACTOR_HEADER, create_router};
pub use request::{CreatePeriodRequest, MarkPaidRequest};
pub use response::ApiError;
pub use state::AppState;
