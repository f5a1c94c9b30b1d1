use async_trait::async_trait;

use super::QueueError;

/// One message handed over by the queue transport.
#[async_trait]
pub trait Delivery: Send {
    /// Raw message body.
    fn body(&self) -> &[u8];

    /// Tell the transport the message has been handled.
    async fn acknowledge(self) -> Result<(), QueueError>;
}
