//! Health check endpoint.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Runs every dependency probe.
///
/// Returns `200 ok` when all pass, otherwise `503` with the failure reasons as plain text.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, status.reason())
}
