//! Self metrics describing the ingestion stream.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

/// Trait for recording ingestion metrics.
pub trait IngestRecorder: Clone + Send + Sync + 'static {
    /// Records one processed message with its outcome (`ok`, `decode_error`, `instrument_error`).
    fn record_message(&self, result: &str);

    /// Records how long one `ingest` call took.
    fn record_ingest_duration(&self, duration_secs: f64);

    /// Records the number of gauges currently registered.
    fn record_instrument_count(&self, count: usize);
}

/// Prometheus-backed ingestion metrics.
#[derive(Clone)]
pub struct BridgeMetrics {
    messages_total: IntCounterVec,
    ingest_duration_seconds: Histogram,
    instruments: IntGauge,
}

impl BridgeMetrics {
    /// Creates the metrics and registers them with `registry`.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let messages_total = IntCounterVec::new(
            Opts::new(
                "metricbridge_messages_total",
                "Total number of queue messages processed",
            ),
            &["result"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        let ingest_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "metricbridge_ingest_duration_seconds",
                "Time spent turning one message into metrics",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(ingest_duration_seconds.clone()))?;

        let instruments = IntGauge::new(
            "metricbridge_instruments",
            "Number of observable gauges registered from queue messages",
        )?;
        registry.register(Box::new(instruments.clone()))?;

        Ok(BridgeMetrics {
            messages_total,
            ingest_duration_seconds,
            instruments,
        })
    }
}

impl IngestRecorder for BridgeMetrics {
    fn record_message(&self, result: &str) {
        self.messages_total.with_label_values(&[result]).inc();
    }

    fn record_ingest_duration(&self, duration_secs: f64) {
        self.ingest_duration_seconds.observe(duration_secs);
    }

    fn record_instrument_count(&self, count: usize) {
        self.instruments.set(count as i64);
    }
}
