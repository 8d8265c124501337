use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};
use crate::severity::Severity;

/// Discriminator for the kind of observation a watcher emitted.
///
/// Additional variants are expected over time; unrecognized strings fail
/// contract validation rather than silently falling back to a default,
/// extending the same unknown-fields-are-rejected posture to enum values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ServiceUp,
    ServiceDown,
    ResourceAnomaly,
    DiskPressure,
    NetworkPartition,
    CertificateExpiring,
    BackupFailed,
    Custom(String),
}

/// A raw observation emitted by a watcher.
///
/// Created by a watcher, consumed exactly once by the correlator, never
/// mutated afterward. The bus owns delivery; the audit store owns the
/// immutable historical copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Event {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub event_id: Uuid,
    pub event_type: EventType,
    pub severity: Severity,
    /// Open object carrying event-type-specific fields (e.g. `service`,
    /// `host`, `anomaly_kind`). Validated structurally only by the
    /// message's own schema; the correlator reads select fields out of it
    /// for fingerprinting.
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(source: impl Into<String>, event_type: EventType, severity: Severity, data: serde_json::Value) -> Self {
        Self {
            envelope: Envelope::new(source),
            event_id: new_id(),
            event_type,
            severity,
            data,
        }
    }
}
