//! Observable gauges: instruments whose values are produced by a callback at scrape time.

use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use thiserror::Error;
use tracing::warn;

/// Sink handed to a gauge callback during a scrape.
pub trait Observer {
    /// Record one value. `attributes` are expected in ascending key order.
    fn observe(&mut self, value: f64, attributes: &[(&str, &str)]);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("observation failed: {0}")]
pub struct CallbackError(pub String);

/// Produces the current observations of one gauge.
pub type Callback = Box<dyn Fn(&mut dyn Observer) -> Result<(), CallbackError> + Send + Sync>;

/// One value reported by a callback, with its attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub attributes: Vec<(String, String)>,
}

impl Observer for Vec<Observation> {
    fn observe(&mut self, value: f64, attributes: &[(&str, &str)]) {
        self.push(Observation {
            value,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }
}

/// A pull-based gauge bound to a single metric name.
///
/// Cloning yields a handle to the same instrument.
#[derive(Clone)]
pub struct ObservableGauge {
    inner: Arc<GaugeInner>,
}

struct GaugeInner {
    name: String,
    help: String,
    desc: Desc,
    callback: Callback,
}

impl ObservableGauge {
    /// Build the gauge descriptor. Fails if `name` is not a valid metric name.
    pub fn new(name: &str, help: impl Into<String>, callback: Callback) -> prometheus::Result<Self> {
        let help = help.into();
        let desc = Desc::new(name.to_string(), help.clone(), Vec::new(), HashMap::new())?;
        Ok(ObservableGauge {
            inner: Arc::new(GaugeInner {
                name: name.to_string(),
                help,
                desc,
                callback,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when both handles refer to the same instrument.
    pub fn same_instrument(&self, other: &ObservableGauge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the callback and return what it observed.
    pub fn observe(&self) -> Result<Vec<Observation>, CallbackError> {
        let mut observations = Vec::new();
        (self.inner.callback)(&mut observations)?;
        Ok(observations)
    }
}

impl fmt::Debug for ObservableGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableGauge")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Collector for ObservableGauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut family = FamilyBuilder::default();
        if let Err(e) = (self.inner.callback)(&mut family) {
            warn!(metric = %self.inner.name, error = %e, "Gauge callback failed; skipping metric");
            return Vec::new();
        }
        if !family.dropped.is_empty() {
            warn!(
                metric = %self.inner.name,
                dropped = ?family.dropped,
                "Label keys collide after renaming; dropped them"
            );
        }
        if family.series.is_empty() {
            return Vec::new();
        }
        vec![family.finish(&self.inner.name, &self.inner.help)]
    }
}

/// Collects observations into a gauge metric family.
///
/// Observations sharing an attribute set collapse to the last one, and series come out
/// ordered by attribute set.
#[derive(Default)]
struct FamilyBuilder {
    series: BTreeMap<Vec<(String, String)>, f64>,
    dropped: BTreeSet<String>,
}

impl Observer for FamilyBuilder {
    fn observe(&mut self, value: f64, attributes: &[(&str, &str)]) {
        let (labels, dropped) = exposition_labels(attributes);
        self.dropped
            .extend(dropped.into_iter().map(str::to_string));
        self.series.insert(labels, value);
    }
}

impl FamilyBuilder {
    fn finish(self, name: &str, help: &str) -> MetricFamily {
        let mut family = MetricFamily::default();
        family.set_name(name.to_string());
        family.set_help(help.to_string());
        family.set_field_type(MetricType::GAUGE);

        for (attributes, value) in self.series {
            let mut metric = Metric::default();
            for (k, v) in attributes {
                let mut pair = LabelPair::default();
                pair.set_name(k);
                pair.set_value(v);
                metric.mut_label().push(pair);
            }
            let mut gauge = Gauge::default();
            gauge.set_value(value);
            metric.set_gauge(gauge);
            family.mut_metric().push(metric);
        }

        family
    }
}

/// Rewrite a label key into a valid Prometheus label name.
///
/// The reserved `__` prefix is reduced to a single underscore.
pub fn sanitize_label_name(key: &str) -> String {
    let mut out: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    while out.starts_with("__") {
        out.remove(0);
    }
    out
}

/// Rename attribute keys into label names and order them by the new name.
///
/// When several keys end up with the same name, a key that was already valid wins, then the
/// key that sorts first. The losing raw keys are returned alongside the labels.
pub fn exposition_labels<'a>(
    attributes: &[(&'a str, &str)],
) -> (Vec<(String, String)>, Vec<&'a str>) {
    let mut renamed: Vec<(String, &'a str, &str)> = attributes
        .iter()
        .map(|&(key, value)| (sanitize_label_name(key), key, value))
        .collect();
    renamed.sort_by(|a, b| (a.0 != a.1, a.1).cmp(&(b.0 != b.1, b.1)));

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    let mut dropped = Vec::new();
    for (name, key, value) in renamed {
        match labels.entry(name) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
            btree_map::Entry::Occupied(_) => dropped.push(key),
        }
    }
    dropped.sort_unstable();
    (labels.into_iter().collect(), dropped)
}
