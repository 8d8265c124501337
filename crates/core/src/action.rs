use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// A command to perform a side effect, derived from an
/// [`EXECUTE_SAFE_ACTION`](crate::decision::DecisionType::ExecuteSafeAction)
/// or an approved `REQUEST_APPROVAL` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Action {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub action_id: Uuid,
    pub decision_id: Uuid,
    pub action_type: String,
    pub parameters: serde_json::Value,
}

impl Action {
    pub fn new(
        source: impl Into<String>,
        decision_id: Uuid,
        action_type: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            action_id: new_id(),
            decision_id,
            action_type: action_type.into(),
            parameters,
        }
    }
}

/// Terminal status of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
    RolledBack,
    Rejected,
}

/// The result of attempting to execute an [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Outcome {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub outcome_id: Uuid,
    pub action_id: Uuid,
    pub status: OutcomeStatus,
    pub execution_time_ms: u64,
    /// Moment execution began; used by callers to check an outcome against
    /// the approval's `expires_at`.
    pub execution_started_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn new(
        source: impl Into<String>,
        action_id: Uuid,
        status: OutcomeStatus,
        execution_time_ms: u64,
        execution_started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            outcome_id: new_id(),
            action_id,
            status,
            execution_time_ms,
            execution_started_at,
            error,
        }
    }
}
