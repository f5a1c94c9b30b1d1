#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use metricbridge::config::{extract, ConfigV1};
use metricbridge::health::{HealthChecker, Probe};
use metricbridge::routes::create_router;
use metricbridge::startup::Bridge;
use metricbridge::state::AppState;
use tower::ServiceExt;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
logging:
  level: "debug"
  format: "json"
rabbit:
  host: "127.0.0.1"
  port: 5672
  username: "guest"
  password: "guest"
  exchange: "metrics"
web:
  host: "127.0.0.1"
  port: 2222
"#;

pub fn load_test_config() -> ConfigV1 {
    extract(Figment::new().merge(Yaml::string(TEST_CONFIG))).expect("Failed to parse test config YAML")
}

/// A probe with a fixed outcome.
pub struct StaticProbe {
    pub name: &'static str,
    pub outcome: Result<(), &'static str>,
}

#[async_trait]
impl Probe for StaticProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<(), String> {
        self.outcome.map_err(str::to_string)
    }
}

pub fn static_probe(name: &'static str, outcome: Result<(), &'static str>) -> Arc<dyn Probe> {
    Arc::new(StaticProbe { name, outcome })
}

pub fn build_app(bridge: &Bridge, probes: Vec<Arc<dyn Probe>>) -> Router {
    let state = AppState {
        exporter: bridge.exporter.clone(),
        health: Arc::new(HealthChecker::new(probes)),
    };
    create_router(state)
}

pub async fn get(app: Router, path: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request");

    let response = app.oneshot(request).await.expect("request failed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Lines of the exposition text belonging to `metric`, without comments.
pub fn series<'a>(text: &'a str, metric: &str) -> Vec<&'a str> {
    text.lines()
        .filter(|line| {
            line.strip_prefix(metric)
                .map(|rest| rest.starts_with('{') || rest.starts_with(' '))
                .unwrap_or(false)
        })
        .collect()
}
