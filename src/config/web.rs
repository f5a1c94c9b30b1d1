use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the `/metrics` and `/health` routes are served.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl WebConfig {
    /// `host:port`, with IPv6 hosts bracketed.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", bracket_ipv6(&self.host), self.port)
    }

    /// URL of our own metrics endpoint, as probed by the health check.
    ///
    /// A wildcard bind address is probed through loopback.
    pub fn metrics_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" | "[::]" => "[::1]",
            other => other,
        };
        format!("http://{}:{}/metrics", bracket_ipv6(host), self.port)
    }
}

fn bracket_ipv6(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Timeouts of the two health probes.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub metrics_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub queue_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            metrics_timeout_ms: default_probe_timeout_ms(),
            queue_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}
