//! Application startup and server initialization.
//!
//! Wires the sample store, instrument registry and ingestion pipeline together, serves
//! `/metrics` and `/health`, and feeds RabbitMQ deliveries into the pipeline until shutdown.

use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::ConfigV1;
use crate::health::{HealthChecker, MetricsEndpointProbe, Probe, RabbitProbe};
use crate::ingest::Pipeline;
use crate::metrics::{BridgeMetrics, Exporter, InstrumentRegistry};
use crate::queue::{amqp, consume};
use crate::routes;
use crate::state::AppState;
use crate::store::SampleStore;

/// The process-wide ingestion components.
pub struct Bridge {
    pub store: Arc<SampleStore>,
    pub instruments: Arc<InstrumentRegistry>,
    pub pipeline: Pipeline<BridgeMetrics>,
    pub exporter: Exporter,
}

impl Bridge {
    /// Builds a bridge around a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let store = Arc::new(SampleStore::new());
        let instruments = Arc::new(InstrumentRegistry::new(registry.clone(), store.clone()));
        let recorder = BridgeMetrics::new(&registry)?;
        let pipeline = Pipeline::new(store.clone(), instruments.clone(), recorder);

        Ok(Bridge {
            store,
            instruments,
            pipeline,
            exporter: Exporter::new(registry),
        })
    }
}

/// Probes for our own metrics endpoint and for the broker.
pub fn build_health_checker(config: &ConfigV1) -> Result<HealthChecker, reqwest::Error> {
    let metrics_probe = MetricsEndpointProbe::new(
        config.web.metrics_url(),
        Duration::from_millis(config.health.metrics_timeout_ms),
    )?;
    let rabbit_probe = RabbitProbe::new(
        config.rabbit.clone(),
        Duration::from_millis(config.health.queue_timeout_ms),
    );

    let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(metrics_probe), Arc::new(rabbit_probe)];
    Ok(HealthChecker::new(probes))
}

/// Initializes and runs the application.
///
/// # Errors
///
/// Returns an error if the HTTP listener cannot be bound, the RabbitMQ subscription cannot be
/// set up, or the delivery stream breaks.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let bridge = Bridge::new()?;
    let health = Arc::new(build_health_checker(&config)?);

    let state = AppState {
        exporter: bridge.exporter.clone(),
        health,
    };
    let app = routes::create_router(state);

    let listener = TcpListener::bind(config.web.bind_address()).await?;
    info!(
        "Serving metrics at http://{}/metrics",
        config.web.bind_address()
    );

    let (stop_server, mut server_stopped) = watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_stopped.changed().await;
            })
            .await
    });

    let (connection, consumer) = amqp::subscribe(&config.rabbit).await?;
    let consumed = consume(
        amqp::deliveries(consumer),
        &bridge.pipeline,
        shutdown_signal(),
    )
    .await;

    if let Err(e) = connection.close(200, "shutting down").await {
        error!(error = %e, "Failed to close RabbitMQ connection");
    }
    let _ = stop_server.send(true);
    server.await??;

    let summary = consumed?;
    info!(
        received = summary.received,
        ingested = summary.ingested,
        failed = summary.failed,
        "Consumer stopped"
    );
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
