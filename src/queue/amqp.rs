//! RabbitMQ adapter built on `lapin`.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::info;

use super::{Delivery, QueueError};
use crate::config::{ExchangeKindConfig, RabbitConfig};

/// A message received from RabbitMQ.
pub struct AmqpDelivery(pub lapin::message::Delivery);

#[async_trait]
impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    async fn acknowledge(self) -> Result<(), QueueError> {
        self.0
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))
    }
}

impl From<ExchangeKindConfig> for ExchangeKind {
    fn from(kind: ExchangeKindConfig) -> Self {
        match kind {
            ExchangeKindConfig::Fanout => ExchangeKind::Fanout,
            ExchangeKindConfig::Direct => ExchangeKind::Direct,
            ExchangeKindConfig::Topic => ExchangeKind::Topic,
            ExchangeKindConfig::Headers => ExchangeKind::Headers,
        }
    }
}

/// Open a connection to the broker.
pub async fn connect(config: &RabbitConfig) -> Result<Connection, QueueError> {
    Connection::connect(&config.uri(), ConnectionProperties::default())
        .await
        .map_err(|source| QueueError::Connect {
            uri: config.redacted_uri(),
            source,
        })
}

/// Connect, declare the exchange and queue, bind them and start consuming.
///
/// The returned connection must be kept alive for as long as the consumer is read.
pub async fn subscribe(config: &RabbitConfig) -> Result<(Connection, Consumer), QueueError> {
    let connection = connect(config).await?;

    let channel = connection
        .create_channel()
        .await
        .map_err(setup("channel open"))?;

    channel
        .exchange_declare(
            &config.exchange,
            config.exchange_kind.into(),
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(setup("exchange declare"))?;

    let queue = channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                exclusive: config.queue.is_empty(),
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(setup("queue declare"))?;

    channel
        .queue_bind(
            queue.name().as_str(),
            &config.exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(setup("queue bind"))?;

    let consumer = channel
        .basic_consume(
            queue.name().as_str(),
            &config.consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(setup("consume"))?;

    info!(
        exchange = %config.exchange,
        queue = %queue.name().as_str(),
        "Subscribed to RabbitMQ"
    );
    Ok((connection, consumer))
}

fn setup(step: &'static str) -> impl FnOnce(lapin::Error) -> QueueError {
    move |source| QueueError::Setup { step, source }
}

/// Adapt a lapin consumer to the `Delivery` contract.
pub fn deliveries(
    consumer: Consumer,
) -> impl Stream<Item = Result<AmqpDelivery, lapin::Error>> {
    consumer.map(|delivery| delivery.map(AmqpDelivery))
}
