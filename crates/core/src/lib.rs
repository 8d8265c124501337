//! Shared message types for the ORION control plane.
//!
//! Every type here is a pure data shape: construction helpers enforce the
//! few invariants that belong at the type level (reasoning length,
//! confidence clamping), everything else is enforced by contract validation
//! (`orion-contracts`) against the JSON Schema documents that are the actual
//! authority over what a valid message looks like.

pub mod action;
pub mod approval;
pub mod decision;
pub mod edge;
pub mod envelope;
pub mod event;
pub mod health;
pub mod incident;
pub mod inference;
pub mod severity;
pub mod validation;

pub use action::{Action, Outcome, OutcomeStatus};
pub use approval::{ApprovalDecision, ApprovalRequest};
pub use decision::{AutonomyLevel, Decision, DecisionType, ReasoningTooShort, SafetyClassification};
pub use edge::{
    CommandPriority, CommandType, ConnectionStatus, EdgeCommand, EdgeHealth, EdgeSafetyStatus,
    EdgeState, EdgeTelemetry, TelemetryType,
};
pub use envelope::{ENVELOPE_VERSION, Envelope, new_id};
pub use event::{Event, EventType};
pub use health::NodeHealth;
pub use incident::{CorrelationWindow, Incident};
pub use inference::{ChatMessage, InferenceRequest, InferenceResponse};
pub use severity::Severity;
pub use validation::{ValidationRecord, ValidationResult, ValidatorKind};
