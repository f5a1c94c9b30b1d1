use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Connection and topology settings for the RabbitMQ consumer.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct RabbitConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    /// Exchange the metric messages are published to.
    pub exchange: String,
    #[serde(default)]
    pub exchange_kind: ExchangeKindConfig,
    /// Queue to consume from; empty means a server-named exclusive queue.
    #[serde(default)]
    pub queue: String,
    #[serde(default = "default_consumer_tag")]
    pub consumer_tag: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKindConfig {
    #[default]
    Fanout,
    Direct,
    Topic,
    Headers,
}

impl RabbitConfig {
    /// AMQP URI, with the credentials and vhost percent-encoded.
    pub fn uri(&self) -> String {
        self.uri_with_password(&percent_encode(&self.password))
    }

    /// The URI with the password masked, for logs.
    pub fn redacted_uri(&self) -> String {
        self.uri_with_password("***")
    }

    fn uri_with_password(&self, password: &str) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            percent_encode(&self.username),
            password,
            self.host,
            self.port,
            percent_encode(&self.vhost)
        )
    }
}

/// Encode everything outside the URI unreserved set.
fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn default_port() -> u16 {
    5672
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_consumer_tag() -> String {
    env!("CARGO_PKG_NAME").to_string()
}
