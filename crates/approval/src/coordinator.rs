use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orion_core::{ApprovalDecision, ApprovalRequest};
use orion_crypto::AdminRegistry;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApprovalError;

/// Terminal states are sticky: once reached, `resolve` never moves a request
/// out of them again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Pending,
    Approved,
    Denied,
    Expired,
    Rejected,
}

impl ApprovalState {
    fn is_terminal(self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }
}

struct Entry {
    request: ApprovalRequest,
    state: ApprovalState,
}

/// Result of feeding an [`ApprovalDecision`] into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Approved,
    Denied,
    Rejected { reason: String },
}

/// In-memory approval state machine keyed by `request_id`.
///
/// Holds every request from `PENDING` through to a terminal state so that a
/// replayed decision after termination resolves to `Rejected` rather than
/// re-applying — the one exception is `EXPIRED`, which is removed from the
/// map once the escalation fires.
pub struct ApprovalCoordinator {
    admins: Arc<AdminRegistry>,
    audit: Arc<orion_audit::AuditStore>,
    pending: DashMap<Uuid, Entry>,
}

impl ApprovalCoordinator {
    pub fn new(admins: Arc<AdminRegistry>, audit: Arc<orion_audit::AuditStore>) -> Self {
        Self { admins, audit, pending: DashMap::new() }
    }

    /// Registers a freshly published request as `PENDING`.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub fn submit(&self, request: ApprovalRequest) {
        let request_id = request.request_id;
        self.pending.insert(request_id, Entry { request, state: ApprovalState::Pending });
    }

    /// Current state of a request, or `None` if it was never submitted or
    /// has already been swept as expired.
    pub fn state(&self, request_id: Uuid) -> Option<ApprovalState> {
        self.pending.get(&request_id).map(|e| e.state)
    }

    pub fn expires_at(&self, request_id: Uuid) -> Option<DateTime<Utc>> {
        self.pending.get(&request_id).map(|e| e.request.expires_at)
    }

    /// The `decision_id` a request was opened for, used by the process
    /// composing this coordinator with an executor to recover which
    /// decision an approved request should trigger: the identifier is
    /// carried explicitly in the payload, never as an in-process pointer.
    pub fn decision_id_for(&self, request_id: Uuid) -> Option<Uuid> {
        self.pending.get(&request_id).map(|e| e.request.decision_id)
    }

    /// Count of requests still awaiting a terminal state, for health/stats
    /// surfaces.
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|e| e.state == ApprovalState::Pending).count()
    }

    /// Applies an incoming [`ApprovalDecision`], verifying the claimed
    /// identity before trusting `approved`. Every outcome — including
    /// rejections — is audited; approval is never silent.
    #[instrument(skip(self, decision), fields(request_id = %decision.request_id, approver_id = %decision.approver_id))]
    pub async fn resolve(
        &self,
        decision: &ApprovalDecision,
        now: DateTime<Utc>,
    ) -> Result<ResolveOutcome, ApprovalError> {
        let Some(mut entry) = self.pending.get_mut(&decision.request_id) else {
            warn!("approval decision for unknown or already-expired request");
            return self.reject(decision, "unknown or already-expired request").await;
        };

        if entry.state.is_terminal() {
            let reason = "request already terminal".to_string();
            drop(entry);
            return self.reject(decision, &reason).await;
        }

        if let Err(e) = self.admins.verify_approval(decision) {
            entry.state = ApprovalState::Rejected;
            drop(entry);
            let reason = format!("identity verification failed: {e}");
            return self.reject(decision, &reason).await;
        }

        if now >= entry.request.expires_at {
            let reason = "request expired before this decision arrived".to_string();
            drop(entry);
            return self.reject(decision, &reason).await;
        }

        entry.state = if decision.approved { ApprovalState::Approved } else { ApprovalState::Denied };
        let outcome =
            if decision.approved { ResolveOutcome::Approved } else { ResolveOutcome::Denied };
        drop(entry);

        info!(outcome = ?outcome, "approval decision resolved");
        self.audit.record("approval_decisions", serde_json::to_value(decision)?).await?;
        Ok(outcome)
    }

    async fn reject(
        &self,
        decision: &ApprovalDecision,
        reason: &str,
    ) -> Result<ResolveOutcome, ApprovalError> {
        self.audit
            .record(
                "approval_decisions",
                serde_json::json!({
                    "request_id": decision.request_id,
                    "approver_id": decision.approver_id,
                    "approved": decision.approved,
                    "rejected": true,
                    "reason": reason,
                }),
            )
            .await?;
        Ok(ResolveOutcome::Rejected { reason: reason.to_string() })
    }

    /// Transitions every still-pending request whose `expires_at` has
    /// passed to `EXPIRED`, publishes an escalation audit entry for each,
    /// and removes it from the map. Returns the expired request ids.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ApprovalError> {
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|e| e.state == ApprovalState::Pending && e.request.expires_at <= now)
            .map(|e| *e.key())
            .collect();

        for request_id in &expired {
            if let Some((_, entry)) = self.pending.remove(request_id) {
                warn!(%request_id, action_type = %entry.request.action_type, "approval request expired, escalating");
                self.audit
                    .record(
                        "approval_decisions",
                        serde_json::json!({
                            "request_id": request_id,
                            "action_type": entry.request.action_type,
                            "escalation": true,
                            "reason": "expired with no terminal decision",
                        }),
                    )
                    .await?;
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core::OsRng;

    fn coordinator(dir: &std::path::Path) -> (ApprovalCoordinator, SigningKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut admins = AdminRegistry::new();
        admins.register("alice", signing_key.verifying_key().as_bytes()).unwrap();
        let audit = Arc::new(orion_audit::AuditStore::new(dir));
        (ApprovalCoordinator::new(Arc::new(admins), audit), signing_key)
    }

    fn request(now: DateTime<Utc>) -> ApprovalRequest {
        ApprovalRequest::new("orion-decider", Uuid::new_v4(), "reboot_host", now + Duration::seconds(300))
    }

    fn signed_decision(signing_key: &SigningKey, request_id: Uuid, approved: bool) -> ApprovalDecision {
        let decision =
            ApprovalDecision::new("orion-admin-cli", request_id, "alice", approved, "reviewed");
        let signature = signing_key.sign(&decision.signing_payload());
        decision.with_signature(hex::encode(signature.to_bytes()))
    }

    #[tokio::test]
    async fn valid_approval_from_known_admin_is_approved() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = signed_decision(&signing_key, request_id, true);
        let outcome = coord.resolve(&decision, now).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::Approved);
        assert_eq!(coord.state(request_id), Some(ApprovalState::Approved));
    }

    #[tokio::test]
    async fn explicit_denial_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = signed_decision(&signing_key, request_id, false);
        let outcome = coord.resolve(&decision, now).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::Denied);
        assert_eq!(coord.state(request_id), Some(ApprovalState::Denied));
    }

    #[tokio::test]
    async fn unsigned_decision_is_rejected_not_approved() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, _signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = ApprovalDecision::new("orion-admin-cli", request_id, "alice", true, "reviewed");
        let outcome = coord.resolve(&decision, now).await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
        assert_eq!(coord.state(request_id), Some(ApprovalState::Rejected));
    }

    #[tokio::test]
    async fn unknown_approver_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let signing_key = SigningKey::generate(&mut OsRng);
        let admins = AdminRegistry::new();
        let audit = Arc::new(orion_audit::AuditStore::new(dir.path()));
        let coord = ApprovalCoordinator::new(Arc::new(admins), audit);

        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = signed_decision(&signing_key, request_id, true);
        let outcome = coord.resolve(&decision, now).await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn replaying_decision_after_termination_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = signed_decision(&signing_key, request_id, true);
        coord.resolve(&decision, now).await.unwrap();

        let replay = coord.resolve(&decision, now).await.unwrap();
        assert!(matches!(replay, ResolveOutcome::Rejected { .. }));
        assert_eq!(coord.state(request_id), Some(ApprovalState::Approved));
    }

    #[tokio::test]
    async fn decision_arriving_after_its_own_expiry_is_rejected_not_approved() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let decision = signed_decision(&signing_key, request_id, true);
        let late = now + Duration::seconds(301);
        let outcome = coord.resolve(&decision, late).await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn decision_for_unknown_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, signing_key) = coordinator(dir.path());
        let now = Utc::now();

        let decision = signed_decision(&signing_key, Uuid::new_v4(), true);
        let outcome = coord.resolve(&decision, now).await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn sweep_expires_stale_pending_requests_and_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, _signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let expired = coord.sweep_expired(now + Duration::seconds(301)).await.unwrap();
        assert_eq!(expired, vec![request_id]);
        assert_eq!(coord.state(request_id), None);
    }

    #[tokio::test]
    async fn decision_id_for_and_pending_count_reflect_submitted_requests() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, _signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        let decision_id = req.decision_id;
        coord.submit(req);

        assert_eq!(coord.decision_id_for(request_id), Some(decision_id));
        assert_eq!(coord.pending_count(), 1);
    }

    #[tokio::test]
    async fn sweep_leaves_unexpired_requests_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (coord, _signing_key) = coordinator(dir.path());
        let now = Utc::now();
        let req = request(now);
        let request_id = req.request_id;
        coord.submit(req);

        let expired = coord.sweep_expired(now).await.unwrap();
        assert!(expired.is_empty());
        assert_eq!(coord.state(request_id), Some(ApprovalState::Pending));
    }
}
