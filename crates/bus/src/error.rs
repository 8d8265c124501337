use orion_contracts::ContractError;

/// Errors the bus surfaces to publishers and subscribers.
///
/// `ContractViolation` and `Transport` are kept distinct because callers
/// react to them differently: a contract violation never retries, a
/// transport error may.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("message failed contract validation: {0}")]
    ContractViolation(#[from] ContractError),

    #[error("stream transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}
