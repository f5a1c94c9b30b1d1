use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::{Delivery, QueueError};
use crate::ingest::{IngestError, Pipeline};
use crate::metrics::IngestRecorder;
use crate::utils::log_throttle::LogThrottle;

const FAILURE_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Counters for one run of the consume loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub received: u64,
    pub ingested: u64,
    pub failed: u64,
}

/// Feed deliveries into `pipeline` one at a time until `shutdown` resolves or the stream ends.
///
/// Every delivery is acknowledged after ingestion was attempted, whether or not it succeeded.
/// Ingestion failures are logged and never stop the loop; a broken stream or a failed
/// acknowledgment does.
pub async fn consume<S, D, E, R, F>(
    deliveries: S,
    pipeline: &Pipeline<R>,
    shutdown: F,
) -> Result<ConsumeSummary, QueueError>
where
    S: Stream<Item = Result<D, E>>,
    D: Delivery,
    E: Display,
    R: IngestRecorder,
    F: Future<Output = ()>,
{
    tokio::pin!(deliveries);
    tokio::pin!(shutdown);

    let mut throttle = LogThrottle::new(FAILURE_LOG_INTERVAL);
    let mut summary = ConsumeSummary::default();
    info!("Waiting for messages...");

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping consumer");
                break;
            }
            next = deliveries.next() => next,
        };

        let delivery = match next {
            Some(Ok(delivery)) => delivery,
            Some(Err(e)) => return Err(QueueError::Stream(e.to_string())),
            None => {
                info!("Delivery stream ended");
                break;
            }
        };

        summary.received += 1;
        debug!(body = %String::from_utf8_lossy(delivery.body()), "Received message");

        match pipeline.ingest(delivery.body()) {
            Ok(stored) => {
                summary.ingested += 1;
                debug!(metrics = stored.metrics, samples = stored.samples, "Message ingested");
            }
            Err(e) => {
                summary.failed += 1;
                if let Some(suppressed) = throttle.should_emit(throttle_key(&e)) {
                    warn!(error = %e, suppressed, "Failed to ingest message");
                }
            }
        }

        delivery.acknowledge().await?;
    }

    Ok(summary)
}

fn throttle_key(error: &IngestError) -> &'static str {
    match error {
        IngestError::Decode(e) => e.kind(),
        IngestError::Instruments(_) => "instrument_error",
    }
}
