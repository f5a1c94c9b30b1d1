//! Health combinator: the service is healthy only when every probe passes.

mod checker;
mod probes;

pub use checker::{HealthChecker, HealthStatus};
pub use probes::{MetricsEndpointProbe, Probe, RabbitProbe};
