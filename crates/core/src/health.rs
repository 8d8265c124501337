use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Self-reported health of one inference worker node, held in the shared
/// health registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct NodeHealth {
    pub node_id: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used_mb: u64,
    pub ram_total_mb: u64,
    /// 0 if the sensor is unavailable on this node.
    pub temp_celsius: f64,
    pub models: Vec<String>,
    pub available: bool,
    pub last_seen: DateTime<Utc>,
}

impl NodeHealth {
    /// `true` iff `now - last_seen <= stale_duration`.
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_duration: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_seen) <= stale_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(last_seen: DateTime<Utc>) -> NodeHealth {
        NodeHealth {
            node_id: "worker-a".into(),
            cpu_percent: 10.0,
            ram_percent: 40.0,
            ram_used_mb: 4096,
            ram_total_mb: 10240,
            temp_celsius: 55.0,
            models: vec!["llama3".into()],
            available: true,
            last_seen,
        }
    }

    #[test]
    fn fresh_within_stale_duration() {
        let now = Utc::now();
        let health = sample(now - Duration::seconds(10));
        assert!(health.is_fresh(now, Duration::seconds(15)));
    }

    #[test]
    fn stale_past_duration() {
        let now = Utc::now();
        let health = sample(now - Duration::seconds(20));
        assert!(!health.is_fresh(now, Duration::seconds(15)));
    }
}
