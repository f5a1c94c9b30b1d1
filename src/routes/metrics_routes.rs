//! Metrics exposition endpoint.

use std::time::Duration;

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::error;

/// Header Prometheus sends with its scrape timeout.
const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";
const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates the metrics route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Handler for the /metrics endpoint.
///
/// Collection runs every gauge callback, so it is moved off the async workers and bounded by
/// the scraper's deadline. A scrape that misses it gets `503` instead of waiting.
async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let deadline = scrape_timeout(&headers);
    let exporter = state.exporter.clone();
    let content_type = exporter.content_type();

    let rendered =
        tokio::time::timeout(deadline, tokio::task::spawn_blocking(move || exporter.render()))
            .await;

    match rendered {
        Ok(Ok(Ok(text))) => (StatusCode::OK, [(CONTENT_TYPE, content_type)], text).into_response(),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "Metrics collection task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics collection failed").into_response()
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("metrics collection exceeded {:?}", deadline),
        )
            .into_response(),
    }
}

fn scrape_timeout(headers: &HeaderMap) -> Duration {
    headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_SCRAPE_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_prometheus_scrape_timeout() {
        let mut headers = HeaderMap::new();
        assert_eq!(scrape_timeout(&headers), DEFAULT_SCRAPE_TIMEOUT);

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("2.5"));
        assert_eq!(scrape_timeout(&headers), Duration::from_millis(2500));

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(scrape_timeout(&headers), DEFAULT_SCRAPE_TIMEOUT);

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("-1"));
        assert_eq!(scrape_timeout(&headers), DEFAULT_SCRAPE_TIMEOUT);
    }
}
