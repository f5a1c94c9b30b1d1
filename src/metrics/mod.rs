//! Metrics exposition for Prometheus.
//!
//! Gauges built from queue messages live next to the bridge's own ingestion metrics in a
//! single registry, rendered by the `/metrics` route.

mod exporter;
pub mod gauge;
mod instruments;
mod recorder;

pub use exporter::Exporter;
pub use gauge::{
    exposition_labels, Callback, CallbackError, ObservableGauge, Observation, Observer,
};
pub use instruments::{InstrumentError, InstrumentRegistry};
pub use recorder::{BridgeMetrics, IngestRecorder};
