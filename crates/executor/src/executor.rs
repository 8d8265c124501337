use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use orion_core::{Action, Decision, DecisionType, Outcome, OutcomeStatus, SafetyClassification};
use orion_policy::PolicyStore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dlq::DeadLetterQueue;
use crate::handler::ActionHandler;

/// What the approval coordinator told the caller about the decision being
/// executed, passed in rather than depending on the coordinator's own types
/// so the executor stays usable without pulling in the approval crate.
#[derive(Debug, Clone)]
pub struct ApprovalCheck {
    pub decision_id: Uuid,
    pub approved: bool,
    pub expires_at: DateTime<Utc>,
}

/// Dispatches `EXECUTE_SAFE_ACTION` and approved `REQUEST_APPROVAL`
/// decisions to registered [`ActionHandler`]s and emits outcomes.
///
/// Never invents an action type and never retries on its own — retries, if
/// any, come from upstream re-emission.
pub struct Executor {
    source: String,
    policy: Arc<PolicyStore>,
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    dlq: Arc<DeadLetterQueue>,
}

impl Executor {
    pub fn new(source: impl Into<String>, policy: Arc<PolicyStore>, dlq: Arc<DeadLetterQueue>) -> Self {
        Self { source: source.into(), policy, handlers: HashMap::new(), dlq }
    }

    pub fn register_handler(&mut self, action_type: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action_type.into(), handler);
    }

    /// Depth of the dead-letter queue, for health/stats surfaces.
    pub fn dlq_len(&self) -> usize {
        self.dlq.len()
    }

    /// Executes an `EXECUTE_SAFE_ACTION` decision, re-verifying SAFE
    /// classification against the policy store as defense in depth before
    /// dispatching.
    #[instrument(skip(self, decision, parameters), fields(decision_id = %decision.decision_id))]
    pub async fn execute_safe_action(
        &self,
        decision: &Decision,
        parameters: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Outcome {
        debug_assert_eq!(decision.decision_type, DecisionType::ExecuteSafeAction);
        let Some(action_type) = decision.action_type.as_deref() else {
            return self.failed(decision, now, "EXECUTE_SAFE_ACTION decision carries no action_type");
        };

        if self.policy.classify(action_type) != SafetyClassification::Safe {
            warn!(action_type, "classification changed since decision was formed, refusing to execute");
            return self.failed(
                decision,
                now,
                &format!("action_type {action_type:?} is no longer SAFE under current policy"),
            );
        }

        let action = Action::new(self.source.clone(), decision.decision_id, action_type, parameters);
        self.dispatch(&action, now).await
    }

    /// Executes an approved `REQUEST_APPROVAL` decision. Re-checks the
    /// approval is `APPROVED`, non-expired, and addressed to this decision
    /// even if the coordinator already marked it terminal — the executor
    /// trusts nothing it has not itself verified at the moment of
    /// execution.
    #[instrument(skip(self, decision, approval, parameters), fields(decision_id = %decision.decision_id))]
    pub async fn execute_approved_action(
        &self,
        decision: &Decision,
        approval: &ApprovalCheck,
        parameters: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Outcome {
        debug_assert_eq!(decision.decision_type, DecisionType::RequestApproval);
        let Some(action_type) = decision.action_type.as_deref() else {
            return self.rejected(decision, now, "REQUEST_APPROVAL decision carries no action_type");
        };

        if approval.decision_id != decision.decision_id {
            return self.rejected(decision, now, "approval decision does not match this decision id");
        }
        if !approval.approved {
            return self.rejected(decision, now, "approval was not granted");
        }
        if now >= approval.expires_at {
            return self.rejected(decision, now, "approval expired before execution");
        }

        let action = Action::new(self.source.clone(), decision.decision_id, action_type, parameters);
        self.dispatch(&action, now).await
    }

    async fn dispatch(&self, action: &Action, now: DateTime<Utc>) -> Outcome {
        let Some(handler) = self.handlers.get(action.action_type.as_str()) else {
            warn!(action_type = %action.action_type, "no handler registered for action type");
            return Outcome::new(
                self.source.clone(),
                action.action_id,
                OutcomeStatus::Failed,
                0,
                now,
                Some(format!("no handler registered for action_type {:?}", action.action_type)),
            );
        };

        let started = Instant::now();
        match handler.execute(action).await {
            Ok(_) => {
                info!(action_type = %action.action_type, "action executed successfully");
                Outcome::new(
                    self.source.clone(),
                    action.action_id,
                    OutcomeStatus::Success,
                    started.elapsed().as_millis() as u64,
                    now,
                    None,
                )
            }
            Err(error) => {
                warn!(action_type = %action.action_type, %error, "action execution failed, rolling back");
                if let Err(rollback_error) = handler.rollback(action).await {
                    warn!(action_type = %action.action_type, %rollback_error, "rollback itself failed");
                }
                self.dlq.push(action.clone(), error.clone());
                Outcome::new(
                    self.source.clone(),
                    action.action_id,
                    OutcomeStatus::RolledBack,
                    started.elapsed().as_millis() as u64,
                    now,
                    Some(error),
                )
            }
        }
    }

    fn failed(&self, decision: &Decision, now: DateTime<Utc>, reason: &str) -> Outcome {
        Outcome::new(
            self.source.clone(),
            decision.decision_id,
            OutcomeStatus::Failed,
            0,
            now,
            Some(reason.to_string()),
        )
    }

    fn rejected(&self, decision: &Decision, now: DateTime<Utc>, reason: &str) -> Outcome {
        Outcome::new(
            self.source.clone(),
            decision.decision_id,
            OutcomeStatus::Rejected,
            0,
            now,
            Some(reason.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orion_policy::{ActionEntry as PolicyActionEntry, ActionList, PolicyStore};

    struct AlwaysOk;
    #[async_trait]
    impl ActionHandler for AlwaysOk {
        async fn execute(&self, _action: &Action) -> Result<serde_json::Value, String> {
            Ok(serde_json::Value::Null)
        }
    }

    struct AlwaysFails {
        rollback_called: std::sync::atomic::AtomicBool,
    }
    #[async_trait]
    impl ActionHandler for AlwaysFails {
        async fn execute(&self, _action: &Action) -> Result<serde_json::Value, String> {
            Err("provider unreachable".to_string())
        }
        async fn rollback(&self, _action: &Action) -> Result<(), String> {
            self.rollback_called.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn policy() -> Arc<PolicyStore> {
        let safe = ActionList { actions: vec![PolicyActionEntry { action_type: "acknowledge_incident".into(), cooldown_seconds: 0 }] };
        let risky = ActionList { actions: vec![] };
        Arc::new(PolicyStore::from_parts(safe, risky, HashMap::new()).unwrap())
    }

    fn safe_decision(action_type: &str) -> Decision {
        Decision::new(
            "orion-decider",
            Uuid::new_v4(),
            DecisionType::ExecuteSafeAction,
            Some(action_type.to_string()),
            SafetyClassification::Safe,
            "incident_type=resource_anomaly: safe path".to_string(),
            orion_core::AutonomyLevel::N2,
            None,
        )
        .unwrap()
    }

    fn risky_decision(action_type: &str, expires_at: DateTime<Utc>) -> Decision {
        Decision::new(
            "orion-decider",
            Uuid::new_v4(),
            DecisionType::RequestApproval,
            Some(action_type.to_string()),
            SafetyClassification::Risky,
            "incident_type=service_down: risky path".to_string(),
            orion_core::AutonomyLevel::N3,
            Some(expires_at),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn executes_safe_action_successfully() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("acknowledge_incident", Arc::new(AlwaysOk));

        let decision = safe_decision("acknowledge_incident");
        let outcome =
            executor.execute_safe_action(&decision, serde_json::json!({}), Utc::now()).await;
        assert_eq!(outcome.status, OutcomeStatus::Success);
    }

    #[tokio::test]
    async fn unknown_action_type_is_failed() {
        let executor = Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        let decision = safe_decision("acknowledge_incident");
        let outcome =
            executor.execute_safe_action(&decision, serde_json::json!({}), Utc::now()).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
    }

    #[tokio::test]
    async fn reclassified_action_is_refused_even_if_decision_said_safe() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("reboot_host", Arc::new(AlwaysOk));

        let decision = safe_decision("reboot_host");
        let outcome =
            executor.execute_safe_action(&decision, serde_json::json!({}), Utc::now()).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
    }

    #[tokio::test]
    async fn failed_execution_rolls_back_and_records_dlq_entry() {
        let dlq = Arc::new(DeadLetterQueue::new());
        let mut executor = Executor::new("orion-executor", policy(), dlq.clone());
        let handler = Arc::new(AlwaysFails { rollback_called: std::sync::atomic::AtomicBool::new(false) });
        executor.register_handler("acknowledge_incident", handler.clone());

        let decision = safe_decision("acknowledge_incident");
        let outcome =
            executor.execute_safe_action(&decision, serde_json::json!({}), Utc::now()).await;
        assert_eq!(outcome.status, OutcomeStatus::RolledBack);
        assert!(handler.rollback_called.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(dlq.len(), 1);
    }

    #[tokio::test]
    async fn approved_action_executes() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("reboot_host", Arc::new(AlwaysOk));

        let now = Utc::now();
        let decision = risky_decision("reboot_host", now + chrono::Duration::seconds(300));
        let approval = ApprovalCheck { decision_id: decision.decision_id, approved: true, expires_at: now + chrono::Duration::seconds(300) };
        let outcome =
            executor.execute_approved_action(&decision, &approval, serde_json::json!({}), now).await;
        assert_eq!(outcome.status, OutcomeStatus::Success);
    }

    #[tokio::test]
    async fn expired_approval_is_rejected_even_if_marked_approved() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("reboot_host", Arc::new(AlwaysOk));

        let now = Utc::now();
        let decision = risky_decision("reboot_host", now - chrono::Duration::seconds(1));
        let approval = ApprovalCheck { decision_id: decision.decision_id, approved: true, expires_at: now - chrono::Duration::seconds(1) };
        let outcome =
            executor.execute_approved_action(&decision, &approval, serde_json::json!({}), now).await;
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
    }

    #[tokio::test]
    async fn mismatched_decision_id_is_rejected() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("reboot_host", Arc::new(AlwaysOk));

        let now = Utc::now();
        let decision = risky_decision("reboot_host", now + chrono::Duration::seconds(300));
        let approval = ApprovalCheck { decision_id: Uuid::new_v4(), approved: true, expires_at: now + chrono::Duration::seconds(300) };
        let outcome =
            executor.execute_approved_action(&decision, &approval, serde_json::json!({}), now).await;
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
    }

    #[tokio::test]
    async fn denied_approval_is_rejected() {
        let mut executor =
            Executor::new("orion-executor", policy(), Arc::new(DeadLetterQueue::new()));
        executor.register_handler("reboot_host", Arc::new(AlwaysOk));

        let now = Utc::now();
        let decision = risky_decision("reboot_host", now + chrono::Duration::seconds(300));
        let approval = ApprovalCheck { decision_id: decision.decision_id, approved: false, expires_at: now + chrono::Duration::seconds(300) };
        let outcome =
            executor.execute_approved_action(&decision, &approval, serde_json::json!({}), now).await;
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
    }
}
