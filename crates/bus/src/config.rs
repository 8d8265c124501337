use std::time::Duration;

/// Connection and stream-shaping configuration for [`crate::EventBus`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Prefix every stream name is built from, e.g. `orion` yields
    /// `orion:events`, `orion:incidents`, ...
    pub stream_prefix: String,
    /// Approximate maximum stream length before Redis trims the oldest
    /// entries (default 10 000).
    pub maxlen: usize,
    /// How long a single `XREADGROUP` blocks waiting for new entries before
    /// returning control to the subscribe loop to check for cancellation.
    pub block: Duration,
    /// Entries read per `XREADGROUP` call.
    pub batch_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            stream_prefix: String::from("orion"),
            maxlen: 10_000,
            block: Duration::from_secs(1),
            batch_size: 16,
        }
    }
}

impl BusConfig {
    /// The stream name a message of `message_type` is appended to, e.g.
    /// `stream_for("event") == "orion:events"`.
    pub fn stream_for(&self, message_type: &str) -> String {
        format!("{}:{}s", self.stream_prefix, message_type)
    }

    /// The stream name for a per-device or per-node sub-stream, e.g.
    /// `edge:commands:<device_id>` or `requests:<node_id>`.
    pub fn sub_stream(&self, base: &str, key: &str) -> String {
        format!("{}:{}:{}", self.stream_prefix, base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_for_pluralizes_message_type() {
        let config = BusConfig::default();
        assert_eq!(config.stream_for("event"), "orion:events");
        assert_eq!(config.stream_for("incident"), "orion:incidents");
    }

    #[test]
    fn sub_stream_is_colon_joined() {
        let config = BusConfig::default();
        assert_eq!(config.sub_stream("requests", "worker-a"), "orion:requests:worker-a");
    }
}
