//! Message to metric translation.

pub mod decoder;
pub mod error;
mod pipeline;

pub use decoder::{decode, decode_batches, MetricBatch};
pub use error::{DecodeError, IngestError, RecordError};
pub use pipeline::{IngestSummary, Pipeline};
