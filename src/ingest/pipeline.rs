use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::decoder::decode_batches;
use super::error::IngestError;
use crate::metrics::{IngestRecorder, InstrumentRegistry};
use crate::store::SampleStore;

/// What a successful `ingest` call stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub metrics: usize,
    pub samples: usize,
}

/// Decoder -> sample store -> instrument registry, once per message.
///
/// Calls are expected to come from a single ingestion stream, one message at a time.
pub struct Pipeline<R: IngestRecorder> {
    store: Arc<SampleStore>,
    instruments: Arc<InstrumentRegistry>,
    recorder: R,
}

impl<R: IngestRecorder> Pipeline<R> {
    pub fn new(store: Arc<SampleStore>, instruments: Arc<InstrumentRegistry>, recorder: R) -> Self {
        Pipeline {
            store,
            instruments,
            recorder,
        }
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn instruments(&self) -> &Arc<InstrumentRegistry> {
        &self.instruments
    }

    /// Turn one payload into metrics.
    ///
    /// A payload that fails to decode leaves the store untouched. Otherwise every metric's batch
    /// is stored before its gauge is looked up; if a gauge cannot be created the stored batch
    /// stays and the remaining metrics are still processed.
    pub fn ingest(&self, payload: &[u8]) -> Result<IngestSummary, IngestError> {
        let started = Instant::now();
        let result = self.apply(payload);

        self.recorder
            .record_ingest_duration(started.elapsed().as_secs_f64());
        self.recorder.record_message(match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        });
        result
    }

    fn apply(&self, payload: &[u8]) -> Result<IngestSummary, IngestError> {
        let batches = decode_batches(payload)?;

        let mut summary = IngestSummary::default();
        let mut failures = Vec::new();

        for batch in batches {
            summary.metrics += 1;
            summary.samples += batch.samples.len();

            debug!(metric = %batch.name, samples = batch.samples.len(), "Replacing metric batch");
            self.store.replace(&batch.name, batch.samples);

            if let Err(e) = self.instruments.get_or_create(&batch.name) {
                warn!(metric = %batch.name, error = %e, "Could not create instrument");
                failures.push((batch.name, e));
            }
        }

        self.recorder
            .record_instrument_count(self.instruments.len());

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(IngestError::Instruments(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::{DecodeError, RecordError};
    use crate::metrics::BridgeMetrics;
    use crate::models::LabelSet;
    use prometheus::Registry;

    fn pipeline() -> Pipeline<BridgeMetrics> {
        let registry = Registry::new();
        let store = Arc::new(SampleStore::new());
        let instruments = Arc::new(InstrumentRegistry::new(registry.clone(), store.clone()));
        let recorder = BridgeMetrics::new(&registry).unwrap();
        Pipeline::new(store, instruments, recorder)
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn single_object_is_stored_and_instrumented() {
        let pipeline = pipeline();
        let summary = pipeline
            .ingest(br#"{"metricName": "cpu_temp", "value": 42.5, "core": "0"}"#)
            .unwrap();
        assert_eq!(summary, IngestSummary { metrics: 1, samples: 1 });

        let batch = pipeline.store().snapshot("cpu_temp").unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].value, 42.5);
        assert_eq!(batch[0].labels, labels(&[("core", "0")]));
        assert!(pipeline.instruments().get("cpu_temp").is_some());
    }

    #[test]
    fn array_of_n_objects_keeps_order() {
        let pipeline = pipeline();
        pipeline
            .ingest(
                br#"[
                    {"metricName": "requests_total", "value": 123, "method": "GET"},
                    {"metricName": "requests_total", "value": 234, "method": "POST"},
                    {"metricName": "requests_total", "value": 345, "method": "PUT"}
                ]"#,
            )
            .unwrap();

        let batch = pipeline.store().snapshot("requests_total").unwrap();
        let methods: Vec<&str> = batch.iter().map(|s| s.labels["method"].as_str()).collect();
        assert_eq!(methods, vec!["GET", "POST", "PUT"]);
    }

    #[test]
    fn new_message_replaces_previous_batch() {
        let pipeline = pipeline();
        pipeline
            .ingest(br#"[{"metricName": "m", "value": 1}, {"metricName": "m", "value": 2}]"#)
            .unwrap();
        pipeline
            .ingest(br#"{"metricName": "m", "value": 3}"#)
            .unwrap();

        let batch = pipeline.store().snapshot("m").unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].value, 3.0);
        assert_eq!(pipeline.instruments().len(), 1);
    }

    #[test]
    fn decode_failure_leaves_store_untouched() {
        let pipeline = pipeline();
        pipeline
            .ingest(br#"{"metricName": "kept", "value": 1}"#)
            .unwrap();

        let err = pipeline.ingest(br#"{"value": 1}"#).unwrap_err();
        assert!(err.to_string().contains("metricName missing"));
        assert!(matches!(
            err,
            IngestError::Decode(DecodeError::Record {
                source: RecordError::MetricNameMissing,
                ..
            })
        ));

        let err = pipeline
            .ingest(br#"[{"metricName": "kept", "value": 9}, {"metricName": "other"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("value missing"));

        let all = pipeline.store().snapshot_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all["kept"][0].value, 1.0);
    }

    #[test]
    fn instrument_failure_is_scoped_to_one_metric() {
        let pipeline = pipeline();
        let err = pipeline
            .ingest(
                br#"[
                    {"metricName": "bad name", "value": 1},
                    {"metricName": "good_name", "value": 2}
                ]"#,
            )
            .unwrap_err();

        match err {
            IngestError::Instruments(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "bad name");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The batch for the failing name is kept; the good name is fully processed.
        assert!(pipeline.store().snapshot("bad name").is_some());
        assert!(pipeline.store().snapshot("good_name").is_some());
        assert!(pipeline.instruments().get("good_name").is_some());
        assert!(pipeline.instruments().get("bad name").is_none());
    }

    #[test]
    fn key_order_does_not_change_observations() {
        let first = pipeline();
        let second = pipeline();
        first
            .ingest(br#"{"metricName": "m", "value": 1, "b": "2", "a": "1", "c": "3"}"#)
            .unwrap();
        second
            .ingest(br#"{"c": "3", "a": "1", "value": 1, "metricName": "m", "b": "2"}"#)
            .unwrap();

        let observe = |p: &Pipeline<BridgeMetrics>| {
            p.instruments().get("m").unwrap().observe().unwrap()
        };
        let observed = observe(&first);
        assert_eq!(observed, observe(&second));

        let keys: Vec<&str> = observed[0].attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
