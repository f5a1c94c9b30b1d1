pub mod sample;

pub use sample::{LabelSet, Record, Sample};
