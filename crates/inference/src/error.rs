use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no available node can serve this request")]
    NoAvailableNodes,

    #[error("health registry transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("failed to (de)serialize node health: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event bus error: {0}")]
    Bus(#[from] orion_bus::BusError),

    #[error("inference backend request failed: {0}")]
    Backend(#[from] reqwest::Error),
}
