use std::future::Future;
use std::sync::Arc;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use orion_audit::AuditStore;
use orion_contracts::ContractValidator;

use crate::config::BusConfig;
use crate::error::BusError;

/// Thin layer over Redis Streams with schema enforcement at every publish
/// and consumer-group delivery at every subscribe.
#[derive(Clone)]
pub struct EventBus {
    conn: ConnectionManager,
    config: BusConfig,
    validator: Arc<ContractValidator>,
}

impl EventBus {
    pub async fn connect(config: BusConfig, validator: Arc<ContractValidator>) -> Result<Self, BusError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, config, validator })
    }

    /// Validate `message`, then append it to `<prefix>:<message_type>s`.
    /// Validation failure means nothing is appended — a rejected message
    /// never partially lands on the stream.
    #[instrument(skip(self, message), fields(message_type))]
    pub async fn publish(&self, message: &serde_json::Value, message_type: &str) -> Result<String, BusError> {
        self.validator.validate(message, message_type)?;

        let stream = self.config.stream_for(message_type);
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(
                &stream,
                StreamMaxlen::Approx(self.config.maxlen),
                "*",
                &[("data", payload)],
            )
            .await?;
        debug!(stream = %stream, id = %id, "published message");
        Ok(id)
    }

    /// Publish directly to an arbitrary stream name (used for per-device and
    /// per-worker sub-streams that are not named `<type>s`).
    #[instrument(skip(self, message))]
    pub async fn publish_to_stream(&self, stream: &str, message: &serde_json::Value, message_type: &str) -> Result<String, BusError> {
        self.validator.validate(message, message_type)?;
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(stream, StreamMaxlen::Approx(self.config.maxlen), "*", &[("data", payload)])
            .await?;
        Ok(id)
    }

    /// Create `group` on the stream for `message_type` if it does not
    /// already exist. Idempotent: `BUSYGROUP` is swallowed as success.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "$").await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read, deserialize, validate, and dispatch messages from `stream` to
    /// `handler` under consumer group `group` as `consumer`, until `cancel`
    /// fires.
    ///
    /// Every entry is re-validated against `message_type`'s schema before
    /// reaching `handler` — this is the second contract gate, mirroring the
    /// one `publish` already applies on the way in. An entry that fails to
    /// parse or fails validation is acknowledged and dropped rather than
    /// redelivered forever; if `audit` is given, the drop is recorded under
    /// `"<message_type>_rejected"` before the ack.
    ///
    /// On handler success the entry is acknowledged. On handler error it is
    /// left pending for redelivery to the group — handlers must be
    /// idempotent, since crashes and errors both cause redelivery.
    #[instrument(skip(self, audit, handler, cancel), fields(stream, group, consumer, message_type))]
    pub async fn subscribe<F, Fut>(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        message_type: &str,
        audit: Option<Arc<AuditStore>>,
        cancel: CancellationToken,
        handler: F,
    ) -> Result<(), BusError>
    where
        F: Fn(serde_json::Value) -> Fut,
        Fut: Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
    {
        self.ensure_group(stream, group).await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .block(self.config.block.as_millis() as usize)
            .count(self.config.batch_size);

        loop {
            if cancel.is_cancelled() {
                info!("subscribe loop cancelled");
                return Ok(());
            }

            let mut conn = self.conn.clone();
            let read: Option<StreamReadReply> = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("subscribe loop cancelled mid-read");
                    return Ok(());
                }
                result = conn.xread_options(&[stream], &[">"], &opts) => result?,
            };

            let Some(reply) = read else { continue };

            for key in reply.keys {
                for stream_id in key.ids {
                    let Some(data) = stream_id.map.get("data") else {
                        warn!(id = %stream_id.id, "stream entry missing data field, acking and dropping");
                        self.record_rejection(&audit, message_type, &stream_id.id, "missing data field", None).await;
                        let _: redis::RedisResult<i32> = conn.xack(stream, group, &[&stream_id.id]).await;
                        continue;
                    };
                    let raw = match data {
                        redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                        other => format!("{other:?}"),
                    };
                    let parsed: serde_json::Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(id = %stream_id.id, error = %e, "failed to parse stream entry, acking and dropping");
                            self.record_rejection(&audit, message_type, &stream_id.id, &e.to_string(), None).await;
                            let _: redis::RedisResult<i32> = conn.xack(stream, group, &[&stream_id.id]).await;
                            continue;
                        }
                    };

                    if let Err(e) = self.validator.validate(&parsed, message_type) {
                        warn!(id = %stream_id.id, error = %e, "subscribed entry failed contract validation, acking and dropping");
                        self.record_rejection(&audit, message_type, &stream_id.id, &e.to_string(), Some(&parsed)).await;
                        let _: redis::RedisResult<i32> = conn.xack(stream, group, &[&stream_id.id]).await;
                        continue;
                    }

                    match handler(parsed).await {
                        Ok(()) => {
                            let _: redis::RedisResult<i32> = conn.xack(stream, group, &[&stream_id.id]).await;
                        }
                        Err(e) => {
                            error!(id = %stream_id.id, error = %e, "handler failed, leaving entry pending for redelivery");
                        }
                    }
                }
            }
        }
    }

    async fn record_rejection(
        &self,
        audit: &Option<Arc<AuditStore>>,
        message_type: &str,
        stream_id: &str,
        reason: &str,
        message: Option<&serde_json::Value>,
    ) {
        let Some(audit) = audit else { return };
        let record = serde_json::json!({
            "stream_id": stream_id,
            "reason": reason,
            "message": message,
        });
        if let Err(e) = audit.record(&format!("{message_type}_rejected"), record).await {
            error!(error = %e, "failed to record subscribe-side rejection to the audit store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builds_expected_stream_names() {
        let config = BusConfig::default();
        assert_eq!(config.stream_for("incident"), "orion:incidents");
    }
}
