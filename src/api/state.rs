//! Shared state of the HTTP API.

use std::sync::Arc;

use crate::period::PeriodService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    periods: Arc<PeriodService>,
}

impl AppState {
    /// Creates the state around a period service.
    pub fn new(periods: PeriodService) -> Self {
        Self {
            periods: Arc::new(periods),
        }
    }

    /// Returns the period service.
    pub fn periods(&self) -> &PeriodService {
        &self.periods
    }
}
