use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// Operating mode governing what the decider may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutonomyLevel {
    /// Observe only; never recommends or executes an action.
    N0,
    /// SAFE actions execute automatically; RISKY actions are blocked.
    N2,
    /// SAFE automatic; RISKY requires explicit, non-expired, identity-checked
    /// approval.
    N3,
}

/// What the decider decided to do about an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    NoAction,
    ExecuteSafeAction,
    RequestApproval,
}

/// The policy store's classification of an action type. `Unknown` is
/// always handled by callers as `Risky`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyClassification {
    Safe,
    Risky,
    Unknown,
}

/// The decider's reasoning output for one incident.
///
/// Invariant enforced at construction: `reasoning` is at least 10
/// characters. Callers that need to bypass this for deserialized wire data
/// go through contract validation instead, which enforces the same
/// minimum length at the schema layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Decision {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub decision_id: Uuid,
    pub incident_id: Uuid,
    pub decision_type: DecisionType,
    pub action_type: Option<String>,
    pub safety_classification: SafetyClassification,
    pub reasoning: String,
    pub autonomy_level: AutonomyLevel,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Reasoning too short to satisfy the mandatory minimum.
#[derive(Debug, thiserror::Error)]
#[error("reasoning must be at least 10 characters, got {0}")]
pub struct ReasoningTooShort(usize);

impl Decision {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: impl Into<String>,
        incident_id: Uuid,
        decision_type: DecisionType,
        action_type: Option<String>,
        safety_classification: SafetyClassification,
        reasoning: impl Into<String>,
        autonomy_level: AutonomyLevel,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ReasoningTooShort> {
        let reasoning = reasoning.into();
        if reasoning.len() < 10 {
            return Err(ReasoningTooShort(reasoning.len()));
        }
        Ok(Self {
            envelope: Envelope::new(source),
            decision_id: new_id(),
            incident_id,
            decision_type,
            action_type,
            safety_classification,
            reasoning,
            autonomy_level,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_rejects_short_reasoning() {
        let err = Decision::new(
            "orion-decider",
            new_id(),
            DecisionType::NoAction,
            None,
            SafetyClassification::Unknown,
            "short",
            AutonomyLevel::N0,
            None,
        )
        .unwrap_err();
        assert_eq!(err.0, 5);
    }

    #[test]
    fn decision_accepts_adequate_reasoning() {
        let decision = Decision::new(
            "orion-decider",
            new_id(),
            DecisionType::NoAction,
            None,
            SafetyClassification::Unknown,
            "service_down observed, N0 never acts",
            AutonomyLevel::N0,
            None,
        )
        .unwrap();
        assert_eq!(decision.decision_type, DecisionType::NoAction);
    }

    #[test]
    fn autonomy_level_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&AutonomyLevel::N2).unwrap(), "\"N2\"");
    }

    #[test]
    fn decision_type_wire_format_is_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&DecisionType::ExecuteSafeAction).unwrap(),
            "\"EXECUTE_SAFE_ACTION\""
        );
    }
}
