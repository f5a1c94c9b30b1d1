//! Library exports for metricbridge, shared between the binary and tests.

pub mod config;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
