//! End-to-end pipeline scenarios: five concrete decider/approval/executor
//! flows. Drives the same component APIs `orion-server`'s `main` wires
//! together, in-process and without a bus — the workspace has no
//! in-memory Redis stand-in, so these exercise correlator -> decider ->
//! approval -> executor directly (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;

use orion_approval::{ApprovalCoordinator, ResolveOutcome};
use orion_audit::AuditStore;
use orion_core::{Action, ApprovalDecision, AutonomyLevel, DecisionType, Event, EventType, OutcomeStatus, Severity};
use orion_correlator::{Correlator, CorrelatorConfig};
use orion_crypto::AdminRegistry;
use orion_decider::{Decider, DeciderConfig, IncidentActionMap};
use orion_executor::{ActionHandler, ApprovalCheck, DeadLetterQueue, Executor};
use orion_policy::{ActionEntry, ActionList, ApprovalPolicy, PolicyStore};
use orion_ratelimit::{CircuitBreakerConfig, CircuitBreakerRegistry, CooldownTracker};

struct AlwaysOk;
#[async_trait]
impl ActionHandler for AlwaysOk {
    async fn execute(&self, _action: &Action) -> Result<serde_json::Value, String> {
        Ok(serde_json::Value::Null)
    }
}

fn policy() -> Arc<PolicyStore> {
    let safe = ActionList { actions: vec![ActionEntry { action_type: "acknowledge_incident".into(), cooldown_seconds: 300 }] };
    let risky = ActionList { actions: vec![ActionEntry { action_type: "restart_service".into(), cooldown_seconds: 300 }] };
    let mut approvals = HashMap::new();
    approvals.insert(
        "restart_service".to_string(),
        ApprovalPolicy { timeout_seconds: 300, required_approvers: 1, override_allowed: false },
    );
    Arc::new(PolicyStore::from_parts(safe, risky, approvals).unwrap())
}

fn action_map() -> Arc<IncidentActionMap> {
    let mut map = HashMap::new();
    map.insert("service_up".to_string(), "acknowledge_incident".to_string());
    map.insert("service_down".to_string(), "restart_service".to_string());
    Arc::new(IncidentActionMap::from_map(map))
}

fn decider(autonomy_level: AutonomyLevel) -> Decider {
    decider_with_cooldown(autonomy_level, Arc::new(CooldownTracker::new()))
}

fn decider_with_cooldown(autonomy_level: AutonomyLevel, cooldown: Arc<CooldownTracker>) -> Decider {
    Decider::new(
        "orion-decider",
        autonomy_level,
        policy(),
        cooldown,
        Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default())),
        action_map(),
        None,
        DeciderConfig::default(),
    )
}

fn executor_with(action_type: &str) -> Executor {
    let mut executor = Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
    executor.register_handler(action_type, Arc::new(AlwaysOk));
    executor
}

fn jellyfin_down() -> Event {
    Event::new("orion-watcher-systemd", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "jellyfin"}))
}

/// Scenario 1: N0 observe.
#[test]
fn n0_observe_produces_no_action_only() {
    let mut correlator = Correlator::new(CorrelatorConfig::default());
    let now = Utc::now();
    correlator.ingest(now, &jellyfin_down());
    let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
    assert_eq!(closed.len(), 1);
    let incident = &closed[0];
    assert_eq!(incident.incident_type, "service_down");

    let decider = decider(AutonomyLevel::N0);
    let decision = decider.decide(incident, now);
    assert_eq!(decision.decision_type, DecisionType::NoAction);
    assert!(decision.reasoning.contains("service_down"));
    assert!(decision.action_type.is_none());
}

/// Scenario 2: N2 SAFE action executes, then cooldown blocks the repeat.
#[tokio::test]
async fn n2_safe_action_executes_then_cooldown_blocks_repeat() {
    let mut correlator = Correlator::new(CorrelatorConfig::default());
    let now = Utc::now();
    let event = Event::new("orion-watcher-systemd", EventType::ServiceUp, Severity::Info, serde_json::json!({"service": "jellyfin"}));
    correlator.ingest(now, &event);
    let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
    let incident = &closed[0];

    let cooldown = Arc::new(CooldownTracker::new());
    let decider = decider_with_cooldown(AutonomyLevel::N2, cooldown.clone());
    let decision = decider.decide(incident, now);
    assert_eq!(decision.decision_type, DecisionType::ExecuteSafeAction);
    assert_eq!(decision.action_type.as_deref(), Some("acknowledge_incident"));

    let executor = executor_with("acknowledge_incident");
    let outcome = executor.execute_safe_action(&decision, serde_json::json!({"incident_id": incident.incident_id}), now).await;
    assert_eq!(outcome.status, OutcomeStatus::Success);

    cooldown.record("acknowledge_incident", &incident.fingerprint, now);
    let repeat = decider.decide(incident, now + Duration::seconds(1));
    assert_eq!(repeat.decision_type, DecisionType::NoAction);
    assert!(repeat.reasoning.contains("cooldown"));
}

/// Scenario 3: N2 never executes a RISKY action.
#[test]
fn n2_risky_action_is_blocked() {
    let mut correlator = Correlator::new(CorrelatorConfig::default());
    let now = Utc::now();
    correlator.ingest(now, &jellyfin_down());
    let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
    let incident = &closed[0];

    let decider = decider(AutonomyLevel::N2);
    let decision = decider.decide(incident, now);
    assert_eq!(decision.decision_type, DecisionType::NoAction);
    assert_eq!(decision.action_type, None);
}

/// Scenario 4: N3 approval happy path.
#[tokio::test]
async fn n3_approval_happy_path_executes_after_signed_approval() {
    let mut correlator = Correlator::new(CorrelatorConfig::default());
    let now = Utc::now();
    correlator.ingest(now, &jellyfin_down());
    let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
    let incident = &closed[0];

    let decider = decider(AutonomyLevel::N3);
    let decision = decider.decide(incident, now);
    assert_eq!(decision.decision_type, DecisionType::RequestApproval);
    assert!(decision.expires_at.is_some());
    let request = decider.build_approval_request(&decision);

    let signing_key = SigningKey::generate(&mut OsRng);
    let mut admins = AdminRegistry::new();
    admins.register("alice", signing_key.verifying_key().as_bytes()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(AuditStore::new(dir.path()));
    let coordinator = ApprovalCoordinator::new(Arc::new(admins), audit);
    coordinator.submit(request.clone());

    let approval_decision = ApprovalDecision::new("orion-admin-cli", request.request_id, "alice", true, "looks fine");
    let signature = signing_key.sign(&approval_decision.signing_payload());
    let approval_decision = approval_decision.with_signature(hex::encode(signature.to_bytes()));

    let outcome = coordinator.resolve(&approval_decision, now).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::Approved);

    let executor = executor_with("restart_service");
    let check = ApprovalCheck { decision_id: decision.decision_id, approved: true, expires_at: request.expires_at };
    let outcome = executor.execute_approved_action(&decision, &check, serde_json::json!({"incident_id": incident.incident_id}), now).await;
    assert_eq!(outcome.status, OutcomeStatus::Success);
}

/// Scenario 5: N3 approval expiry, and a late approval refused afterward.
#[tokio::test]
async fn n3_approval_expiry_escalates_and_refuses_late_approval() {
    let mut correlator = Correlator::new(CorrelatorConfig::default());
    let now = Utc::now();
    correlator.ingest(now, &jellyfin_down());
    let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
    let incident = &closed[0];

    let decider = decider(AutonomyLevel::N3);
    let decision = decider.decide(incident, now);
    let request = decider.build_approval_request(&decision);
    let expires_at = request.expires_at;

    let signing_key = SigningKey::generate(&mut OsRng);
    let mut admins = AdminRegistry::new();
    admins.register("alice", signing_key.verifying_key().as_bytes()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(AuditStore::new(dir.path()));
    let coordinator = ApprovalCoordinator::new(Arc::new(admins), audit);
    coordinator.submit(request.clone());

    let past_expiry = expires_at + Duration::seconds(1);
    let expired = coordinator.sweep_expired(past_expiry).await.unwrap();
    assert_eq!(expired, vec![request.request_id]);

    let late_decision = ApprovalDecision::new("orion-admin-cli", request.request_id, "alice", true, "sorry, was afk");
    let signature = signing_key.sign(&late_decision.signing_payload());
    let late_decision = late_decision.with_signature(hex::encode(signature.to_bytes()));

    let outcome = coordinator.resolve(&late_decision, past_expiry).await.unwrap();
    assert!(matches!(outcome, ResolveOutcome::Rejected { .. }));

    let executor = executor_with("restart_service");
    let check = ApprovalCheck { decision_id: decision.decision_id, approved: true, expires_at };
    let outcome = executor.execute_approved_action(&decision, &check, serde_json::json!({}), past_expiry).await;
    assert_eq!(outcome.status, OutcomeStatus::Rejected);
}
