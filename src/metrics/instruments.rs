//! One observable gauge per metric name, created on first sight.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::Registry;
use thiserror::Error;
use tracing::{debug, info};

use super::gauge::{Callback, CallbackError, ObservableGauge, Observer};
use crate::store::SampleStore;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("invalid instrument descriptor: {0}")]
    Descriptor(#[source] prometheus::Error),
    #[error("callback registration failed: {0}")]
    Registration(#[source] prometheus::Error),
}

/// Maps metric names to their gauges and registers each gauge with the exposition registry.
pub struct InstrumentRegistry {
    registry: Registry,
    store: Arc<SampleStore>,
    instruments: DashMap<String, ObservableGauge>,
}

impl InstrumentRegistry {
    pub fn new(registry: Registry, store: Arc<SampleStore>) -> Self {
        InstrumentRegistry {
            registry,
            store,
            instruments: DashMap::new(),
        }
    }

    /// Return the gauge for `name`, creating and registering it if this is the first call.
    ///
    /// This is the only race-sensitive operation here. The entry for `name` stays locked while
    /// the gauge is built and registered, so concurrent first calls for the same name wait and
    /// then receive the winner's gauge. A failed creation leaves no entry behind and the next
    /// call for that name tries again.
    pub fn get_or_create(&self, name: &str) -> Result<ObservableGauge, InstrumentError> {
        if let Some(existing) = self.instruments.get(name) {
            return Ok(existing.clone());
        }

        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let gauge = ObservableGauge::new(
                    name,
                    format!("Gauge for {}", name),
                    observe_latest_batch(self.store.clone(), name.to_string()),
                )
                .map_err(InstrumentError::Descriptor)?;

                self.registry
                    .register(Box::new(gauge.clone()))
                    .map_err(InstrumentError::Registration)?;

                info!(metric = %name, "Registered observable gauge");
                entry.insert(gauge.clone());
                Ok(gauge)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<ObservableGauge> {
        self.instruments.get(name).map(|gauge| gauge.clone())
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Callback that reports the batch stored for `name` at the moment of the scrape.
fn observe_latest_batch(store: Arc<SampleStore>, name: String) -> Callback {
    Box::new(
        move |observer: &mut dyn Observer| -> Result<(), CallbackError> {
            let Some(batch) = store.snapshot(&name) else {
                debug!(metric = %name, "No samples stored yet");
                return Ok(());
            };
            for sample in batch.iter() {
                observer.observe(sample.value, &sample.attributes());
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelSet, Sample};
    use prometheus::core::Collector;
    use std::sync::Barrier;
    use std::thread;

    fn registry() -> (InstrumentRegistry, Arc<SampleStore>, Registry) {
        let store = Arc::new(SampleStore::new());
        let prom = Registry::new();
        (InstrumentRegistry::new(prom.clone(), store.clone()), store, prom)
    }

    fn sample(value: f64, pairs: &[(&str, &str)]) -> Sample {
        let labels: LabelSet = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Sample::new(value, labels)
    }

    #[test]
    fn returns_the_same_gauge_for_a_known_name() {
        let (instruments, _, _) = registry();
        let first = instruments.get_or_create("cpu_temp").unwrap();
        let second = instruments.get_or_create("cpu_temp").unwrap();
        assert!(first.same_instrument(&second));
        assert_eq!(instruments.len(), 1);
    }

    #[test]
    fn concurrent_first_sight_creates_one_instrument() {
        let (instruments, _, prom) = registry();
        let instruments = Arc::new(instruments);
        let barrier = Arc::new(Barrier::new(100));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let instruments = instruments.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    instruments.get_or_create("shared_metric")
                })
            })
            .collect();

        let gauges: Vec<ObservableGauge> = handles
            .into_iter()
            .map(|h| h.join().unwrap().expect("creation must not fail"))
            .collect();

        assert!(gauges.iter().all(|g| g.same_instrument(&gauges[0])));
        assert_eq!(instruments.len(), 1);

        // A second registration of the same descriptor would have been rejected.
        let duplicate = ObservableGauge::new(
            "shared_metric",
            "Gauge for shared_metric",
            observe_latest_batch(Arc::new(SampleStore::new()), "shared_metric".into()),
        )
        .unwrap();
        assert!(prom.register(Box::new(duplicate)).is_err());
    }

    #[test]
    fn invalid_name_fails_without_poisoning_other_names() {
        let (instruments, _, _) = registry();

        let err = instruments.get_or_create("not a metric").unwrap_err();
        assert!(matches!(err, InstrumentError::Descriptor(_)));
        assert!(instruments.get("not a metric").is_none());

        assert!(instruments.get_or_create("fine_metric").is_ok());
        assert_eq!(instruments.len(), 1);
    }

    #[test]
    fn registration_conflict_is_reported() {
        let (instruments, _, prom) = registry();
        let taken = prometheus::IntGauge::new("taken", "already here").unwrap();
        prom.register(Box::new(taken)).unwrap();

        let err = instruments.get_or_create("taken").unwrap_err();
        assert!(matches!(err, InstrumentError::Registration(_)));
        assert!(instruments.is_empty());
    }

    #[test]
    fn callback_reads_the_store_at_observation_time() {
        let (instruments, store, _) = registry();
        let gauge = instruments.get_or_create("status").unwrap();

        assert!(gauge.observe().unwrap().is_empty());
        assert!(gauge.collect().is_empty());

        store.replace(
            "status",
            vec![sample(1.0, &[("value", "running"), ("service", "auth")])],
        );
        let observed = gauge.observe().unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].value, 1.0);
        assert_eq!(
            observed[0].attributes,
            vec![
                ("service".to_string(), "auth".to_string()),
                ("value".to_string(), "running".to_string()),
            ]
        );

        store.replace("status", vec![sample(3.0, &[]), sample(4.0, &[("a", "b")])]);
        let values: Vec<f64> = gauge.observe().unwrap().iter().map(|o| o.value).collect();
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn registered_gauges_show_up_in_gather() {
        let (instruments, store, prom) = registry();
        instruments.get_or_create("queue_depth").unwrap();
        assert!(prom.gather().iter().all(|f| f.get_name() != "queue_depth"));

        store.replace("queue_depth", vec![sample(7.0, &[("queue", "jobs")])]);
        let families = prom.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "queue_depth")
            .expect("gauge family");
        assert_eq!(family.get_metric()[0].get_gauge().get_value(), 7.0);
    }
}
