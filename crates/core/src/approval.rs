use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};

/// Human-approval request for a RISKY decision, published on the approval
/// stream by the decider under N3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ApprovalRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub request_id: Uuid,
    pub decision_id: Uuid,
    pub action_type: String,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        source: impl Into<String>,
        decision_id: Uuid,
        action_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            request_id: new_id(),
            decision_id,
            action_type: action_type.into(),
            expires_at,
        }
    }
}

/// An admin's answer to an [`ApprovalRequest`].
///
/// Valid only if it arrives before `expires_at` *and* `approver_id` is on
/// the declared admin list — both checks are the approval coordinator's
/// job, not this type's; the type only carries the claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ApprovalDecision {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub decision_record_id: Uuid,
    pub request_id: Uuid,
    pub approver_id: String,
    pub approved: bool,
    pub reason: String,
    /// Ed25519 signature over `request_id || approver_id || approved` so the
    /// coordinator can verify the claimed identity before trusting it.
    pub signature: Option<String>,
}

impl ApprovalDecision {
    pub fn new(
        source: impl Into<String>,
        request_id: Uuid,
        approver_id: impl Into<String>,
        approved: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            decision_record_id: new_id(),
            request_id,
            approver_id: approver_id.into(),
            approved,
            reason: reason.into(),
            signature: None,
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// The exact byte sequence an admin's signature must cover.
    pub fn signing_payload(&self) -> Vec<u8> {
        format!("{}|{}|{}", self.request_id, self.approver_id, self.approved).into_bytes()
    }
}
