//! Application state shared across handlers.

use std::sync::Arc;
use telemetry::Metrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Counters of the running pipeline
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}
