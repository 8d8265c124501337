use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The envelope version every ORION message currently carries.
///
/// Bumping the wire format requires a new constant string, not a change to
/// this one; old validated versions keep being accepted by consumers.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Fields every bus message shares, regardless of message type.
///
/// `Envelope` is deliberately not `#[serde(flatten)]`-ed into every message
/// struct: each message type owns its own `version`/`*_id`/`timestamp`/
/// `source` fields directly so that the generated JSON Schema for each type
/// can mark them individually required, matching the contract documents
/// under `contracts/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Envelope {
    /// Always [`ENVELOPE_VERSION`] for the current schema generation.
    pub version: String,
    /// UTC timestamp of emission.
    pub timestamp: DateTime<Utc>,
    /// Component that emitted the message, e.g. `orion-correlator`.
    pub source: String,
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// Generate a UUIDv7 identifier (time-ordered) for a new entity.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}
