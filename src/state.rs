//! Shared application state.
//!
//! Contains the state that is shared across all request handlers.

use crate::health::HealthChecker;
use crate::metrics::Exporter;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Renders the registry holding every gauge and the ingestion metrics.
    pub exporter: Exporter,
    /// Dependency probes behind `/health`.
    pub health: Arc<HealthChecker>,
}
