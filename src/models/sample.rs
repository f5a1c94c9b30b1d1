//! Decoded metric samples.

use std::collections::BTreeMap;

/// Label name to label value.
///
/// A `BTreeMap` keeps keys unique and iterates them in ascending order, which is the
/// canonical order observations are emitted in.
pub type LabelSet = BTreeMap<String, String>;

/// One numeric point for a metric, with its labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub labels: LabelSet,
}

impl Sample {
    pub fn new(value: f64, labels: LabelSet) -> Self {
        Sample { value, labels }
    }

    /// Labels as `(name, value)` pairs in ascending key order.
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        self.labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// A decoded `(metric name, value, labels)` triple, before grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub metric_name: String,
    pub sample: Sample,
}
