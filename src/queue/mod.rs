//! Queue transport: the delivery contract, the RabbitMQ adapter and the consume loop.

pub mod amqp;
mod consumer;
mod delivery;

use thiserror::Error;

pub use consumer::{consume, ConsumeSummary};
pub use delivery::Delivery;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("could not connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: lapin::Error,
    },
    #[error("{step} failed: {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: lapin::Error,
    },
    #[error("delivery stream failed: {0}")]
    Stream(String),
    #[error("acknowledgment failed: {0}")]
    Ack(String),
}
