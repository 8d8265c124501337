use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// Discriminator for a command directed at an edge actuator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Move,
    Stop,
    Calibrate,
    Status,
    Resume,
}

impl CommandType {
    /// `true` for the commands the edge agent accepts while `in_safe_mode`:
    /// STOP, STATUS, and RESUME are always accepted.
    pub fn accepted_in_safe_mode(self) -> bool {
        matches!(self, CommandType::Stop | CommandType::Status | CommandType::Resume)
    }
}

/// Relative priority of a queued edge command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum CommandPriority {
    Low,
    Normal,
    High,
    Emergency,
}

/// A command dispatched to a specific edge device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct EdgeCommand {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub command_id: Uuid,
    pub command_type: CommandType,
    pub device_id: String,
    pub parameters: serde_json::Value,
    pub priority: CommandPriority,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EdgeCommand {
    pub fn new(
        source: impl Into<String>,
        command_type: CommandType,
        device_id: impl Into<String>,
        parameters: serde_json::Value,
        priority: CommandPriority,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            command_id: new_id(),
            command_type,
            device_id: device_id.into(),
            parameters,
            priority,
            expires_at,
        }
    }
}

/// Discriminator for a telemetry sample's payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryType {
    Position,
    Battery,
    Temperature,
    ServoStatus,
    Network,
}

/// A single telemetry sample from an edge device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct EdgeTelemetry {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub telemetry_id: Uuid,
    pub device_id: String,
    pub telemetry_type: TelemetryType,
    pub value: serde_json::Value,
}

impl EdgeTelemetry {
    pub fn new(
        source: impl Into<String>,
        device_id: impl Into<String>,
        telemetry_type: TelemetryType,
        value: serde_json::Value,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            telemetry_id: new_id(),
            device_id: device_id.into(),
            telemetry_type,
            value,
        }
    }
}

/// Coarse operating state of an edge device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeState {
    Running,
    Idle,
    SafeMode,
    Error,
    Offline,
}

/// Transport-level connection status, independent of [`EdgeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Degraded,
    Disconnected,
}

/// The watchdog/safe-mode sub-object every [`EdgeHealth`] message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct EdgeSafetyStatus {
    pub dead_man_switch_active: bool,
    pub watchdog_remaining_ms: u64,
    pub in_safe_position: bool,
}

/// A full health report published by an edge device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct EdgeHealth {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub health_id: Uuid,
    pub device_id: String,
    pub state: EdgeState,
    pub connection_status: ConnectionStatus,
    pub safety: EdgeSafetyStatus,
}

impl EdgeHealth {
    pub fn new(
        source: impl Into<String>,
        device_id: impl Into<String>,
        state: EdgeState,
        connection_status: ConnectionStatus,
        safety: EdgeSafetyStatus,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            health_id: new_id(),
            device_id: device_id.into(),
            state,
            connection_status,
            safety,
        }
    }
}
