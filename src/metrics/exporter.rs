use prometheus::{Encoder, Registry, TextEncoder};

/// Renders the process registry in Prometheus text format.
#[derive(Clone)]
pub struct Exporter {
    registry: Registry,
}

impl Exporter {
    pub fn new(registry: Registry) -> Self {
        Exporter { registry }
    }

    /// Runs every registered collector (including gauge callbacks) and encodes the result.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics encoding is not UTF-8: {}", e)))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
