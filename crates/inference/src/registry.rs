use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use orion_core::NodeHealth;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::InferenceError;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Redis hash all nodes publish their last-known health into.
    pub hash_key: String,
    /// Prefix for a per-node key carrying a short TTL, a backstop against a
    /// node that disappears without clearing its hash entry.
    pub key_prefix: String,
    pub key_ttl: Duration,
    /// A reading older than this is treated as absent, not just stale.
    pub stale_after: chrono::Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hash_key: "inference:health".to_string(),
            key_prefix: "inference:health:".to_string(),
            key_ttl: Duration::from_secs(30),
            stale_after: chrono::Duration::seconds(15),
        }
    }
}

/// Redis-backed store of the latest health report from each inference
/// worker, built once and shared the way `acteon-provider`'s registry is:
/// a name-keyed lookup over entries that are themselves the source of
/// health-based availability. Freshness is re-checked on every read rather
/// than swept in the background, so a reader never races a concurrent
/// publish into believing a live node is stale.
pub struct WorkerHealthRegistry {
    conn: ConnectionManager,
    config: RegistryConfig,
}

impl WorkerHealthRegistry {
    pub async fn connect(url: &str, config: RegistryConfig) -> Result<Self, InferenceError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, config })
    }

    pub fn from_connection(conn: ConnectionManager, config: RegistryConfig) -> Self {
        Self { conn, config }
    }

    pub async fn publish(&self, health: &NodeHealth) -> Result<(), InferenceError> {
        let payload = serde_json::to_string(health)?;
        let mut conn = self.conn.clone();
        let per_node_key = format!("{}{}", self.config.key_prefix, health.node_id);
        let _: () = conn.hset(&self.config.hash_key, &health.node_id, &payload).await?;
        let _: () = conn.set_ex(&per_node_key, payload, self.config.key_ttl.as_secs()).await?;
        Ok(())
    }

    /// Removes a node's entry, for graceful shutdown.
    pub async fn remove(&self, node_id: &str) -> Result<(), InferenceError> {
        let mut conn = self.conn.clone();
        let per_node_key = format!("{}{}", self.config.key_prefix, node_id);
        let _: () = conn.hdel(&self.config.hash_key, node_id).await?;
        let _: () = conn.del(&per_node_key).await?;
        Ok(())
    }

    /// Every node health reading that is still fresh as of `now`. Stale
    /// entries are opportunistically purged from the hash, but their
    /// absence from the returned set is what routing actually relies on.
    pub async fn fresh_nodes(&self, now: DateTime<Utc>) -> Result<Vec<NodeHealth>, InferenceError> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(&self.config.hash_key).await?;

        let mut fresh = Vec::with_capacity(raw.len());
        let mut stale_ids = Vec::new();
        for (node_id, payload) in raw {
            let health: NodeHealth = serde_json::from_str(&payload)?;
            if health.is_fresh(now, self.config.stale_after) {
                fresh.push(health);
            } else {
                stale_ids.push(node_id);
            }
        }

        for node_id in stale_ids {
            let _: Result<(), _> = conn.hdel(&self.config.hash_key, &node_id).await;
        }

        Ok(fresh)
    }
}
