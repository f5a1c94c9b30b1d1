use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::RabbitConfig;
use crate::queue::amqp;

/// A single liveness check of an external dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short label used in the failure reason.
    fn name(&self) -> &str;

    /// Runs the check once. The error is a human readable reason.
    async fn check(&self) -> Result<(), String>;
}

/// Passes when the metrics endpoint answers with a 2xx status within the timeout.
pub struct MetricsEndpointProbe {
    client: reqwest::Client,
    url: String,
}

impl MetricsEndpointProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(MetricsEndpointProbe {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Probe for MetricsEndpointProbe {
    fn name(&self) -> &str {
        "metrics endpoint"
    }

    async fn check(&self) -> Result<(), String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{} returned status {}", self.url, status));
        }
        Ok(())
    }
}

/// Passes when a fresh connection to the broker can be opened within the timeout.
/// The connection is closed right away.
pub struct RabbitProbe {
    config: RabbitConfig,
    timeout: Duration,
}

impl RabbitProbe {
    pub fn new(config: RabbitConfig, timeout: Duration) -> Self {
        RabbitProbe { config, timeout }
    }
}

#[async_trait]
impl Probe for RabbitProbe {
    fn name(&self) -> &str {
        "rabbitmq"
    }

    async fn check(&self) -> Result<(), String> {
        let connection = tokio::time::timeout(self.timeout, amqp::connect(&self.config))
            .await
            .map_err(|_| format!("connection timed out after {:?}", self.timeout))?
            .map_err(|e| e.to_string())?;

        if let Err(e) = connection.close(200, "health check").await {
            debug!(error = %e, "Closing health probe connection failed");
        }
        Ok(())
    }
}
