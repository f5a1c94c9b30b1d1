//! Payload decoding.
//!
//! A payload is either one JSON object or an array of objects. Every object names a metric in
//! `metricName`, carries its reading in `value`, and any further keys become labels.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::error::{DecodeError, RecordError};
use crate::models::{LabelSet, Record, Sample};
use crate::utils::value::{join_array, value_to_string};

pub const METRIC_NAME_KEY: &str = "metricName";
pub const VALUE_KEY: &str = "value";

/// Samples of one metric, in the order they appeared in the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub name: String,
    pub samples: Vec<Sample>,
}

/// Decode a raw payload into records, failing on the first invalid object.
pub fn decode(payload: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let root: Value = serde_json::from_slice(payload)?;

    match root {
        Value::Object(object) => Ok(vec![decode_object(0, object)?]),
        Value::Array(elements) => elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| match element {
                Value::Object(object) => decode_object(index, object),
                _ => Err(DecodeError::NotAnObject(index)),
            })
            .collect(),
        other => Err(DecodeError::Shape(type_name(&other))),
    }
}

/// Decode a payload and group its records by metric name.
///
/// Batches are returned in the order each name was first seen; samples keep their payload order.
pub fn decode_batches(payload: &[u8]) -> Result<Vec<MetricBatch>, DecodeError> {
    Ok(group_by_metric(decode(payload)?))
}

pub fn group_by_metric(records: Vec<Record>) -> Vec<MetricBatch> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut batches: Vec<MetricBatch> = Vec::new();

    for record in records {
        match positions.get(&record.metric_name) {
            Some(&pos) => batches[pos].samples.push(record.sample),
            None => {
                positions.insert(record.metric_name.clone(), batches.len());
                batches.push(MetricBatch {
                    name: record.metric_name,
                    samples: vec![record.sample],
                });
            }
        }
    }

    batches
}

fn decode_object(index: usize, mut object: Map<String, Value>) -> Result<Record, DecodeError> {
    let at = |source| DecodeError::Record { index, source };

    let metric_name = match object.remove(METRIC_NAME_KEY) {
        None => return Err(at(RecordError::MetricNameMissing)),
        Some(Value::String(name)) if name.is_empty() => {
            return Err(at(RecordError::MetricNameEmpty))
        }
        Some(Value::String(name)) => name,
        Some(_) => return Err(at(RecordError::MetricNameNotString)),
    };

    let raw_value = object
        .remove(VALUE_KEY)
        .ok_or_else(|| at(RecordError::ValueMissing))?;

    let mut labels: LabelSet = object
        .iter()
        .map(|(key, field)| (key.clone(), value_to_string(field)))
        .collect();

    let value = match raw_value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| at(RecordError::UnsupportedValue("number")))?,
        Value::String(text) => {
            labels.insert(VALUE_KEY.to_string(), text);
            1.0
        }
        Value::Array(items) => {
            if let Some(bad) = items.iter().find(|item| !is_primitive(item)) {
                return Err(at(RecordError::UnsupportedValue(type_name(bad))));
            }
            labels.insert(VALUE_KEY.to_string(), join_array(&items));
            1.0
        }
        other => return Err(at(RecordError::UnsupportedValue(type_name(&other)))),
    };

    Ok(Record {
        metric_name,
        sample: Sample::new(value, labels),
    })
}

/// Scalars and arrays made only of scalars.
fn is_primitive(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items.iter().all(is_primitive),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
