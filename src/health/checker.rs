use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use super::Probe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// At least one probe failed; one reason per failing probe.
    Unavailable(Vec<String>),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Short diagnostic text for the health response body.
    pub fn reason(&self) -> String {
        match self {
            HealthStatus::Healthy => "ok".to_string(),
            HealthStatus::Unavailable(reasons) => reasons.join("; "),
        }
    }
}

/// Runs every probe on each call and ANDs the results. Nothing is cached.
#[derive(Clone)]
pub struct HealthChecker {
    probes: Vec<Arc<dyn Probe>>,
}

impl HealthChecker {
    pub fn new(probes: Vec<Arc<dyn Probe>>) -> Self {
        HealthChecker { probes }
    }

    pub async fn check(&self) -> HealthStatus {
        let results = join_all(self.probes.iter().map(|probe| async move {
            probe
                .check()
                .await
                .map_err(|reason| format!("{} not healthy: {}", probe.name(), reason))
        }))
        .await;

        let failures: Vec<String> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            HealthStatus::Healthy
        } else {
            for reason in &failures {
                warn!(%reason, "Health probe failed");
            }
            HealthStatus::Unavailable(failures)
        }
    }
}
