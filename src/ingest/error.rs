//! Errors raised while turning a message into metrics.

use thiserror::Error;

use crate::metrics::InstrumentError;

/// A structural problem with one JSON object in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("metricName missing")]
    MetricNameMissing,
    #[error("metricName must be a string")]
    MetricNameNotString,
    #[error("metricName must be non-empty")]
    MetricNameEmpty,
    #[error("value missing")]
    ValueMissing,
    #[error("unsupported value type: {0}")]
    UnsupportedValue(&'static str),
}

/// Why a payload could not be decoded. Nothing from the payload is kept.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json unmarshal: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json must be object or array of objects, got {0}")]
    Shape(&'static str),
    #[error("element {0} is not an object")]
    NotAnObject(usize),
    #[error("record {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: RecordError,
    },
}

impl DecodeError {
    /// Short, stable tag used for log throttling and self metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Json(_) => "json",
            DecodeError::Shape(_) => "shape",
            DecodeError::NotAnObject(_) => "not_an_object",
            DecodeError::Record { source, .. } => match source {
                RecordError::MetricNameMissing => "metric_name_missing",
                RecordError::MetricNameNotString => "metric_name_not_string",
                RecordError::MetricNameEmpty => "metric_name_empty",
                RecordError::ValueMissing => "value_missing",
                RecordError::UnsupportedValue(_) => "unsupported_value",
            },
        }
    }
}

/// Outcome of a failed `Pipeline::ingest`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload was rejected as a whole; the store was not touched.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Samples were stored for every metric, but some instruments could not be created.
    #[error("{} instrument(s) failed: {}", .0.len(), describe(.0))]
    Instruments(Vec<(String, InstrumentError)>),
}

fn describe(failures: &[(String, InstrumentError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Decode(_) => "decode_error",
            IngestError::Instruments(_) => "instrument_error",
        }
    }
}
