use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use orion_core::{
    ApprovalRequest, AutonomyLevel, Decision, DecisionType, Incident, SafetyClassification, ValidationResult,
};
use orion_policy::PolicyStore;
use orion_ratelimit::{CircuitState, CircuitBreakerRegistry, CooldownTracker};
use tracing::{info, instrument};

use crate::action_map::IncidentActionMap;
use crate::reasoning;
use crate::validator::DecisionValidator;

#[derive(Debug, Clone)]
pub struct DeciderConfig {
    /// Approval timeout used when the candidate action has no specific
    /// `approval_policy.yaml` entry (always true for `Unknown`
    /// classification, since unknown actions are, by definition, absent
    /// from both the SAFE and RISKY lists).
    pub default_approval_timeout_seconds: u64,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self { default_approval_timeout_seconds: 300 }
    }
}

/// Reads incidents, writes decisions. Constructed once with a fixed
/// `AutonomyLevel` and shared handles to the policy store and
/// rate-limiting state; owns no mutable state beyond those handles.
pub struct Decider {
    source: String,
    autonomy_level: AutonomyLevel,
    policy: Arc<PolicyStore>,
    cooldown: Arc<CooldownTracker>,
    breaker: Arc<CircuitBreakerRegistry>,
    action_map: Arc<IncidentActionMap>,
    validator: Option<Arc<dyn DecisionValidator>>,
    config: DeciderConfig,
}

impl Decider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: impl Into<String>,
        autonomy_level: AutonomyLevel,
        policy: Arc<PolicyStore>,
        cooldown: Arc<CooldownTracker>,
        breaker: Arc<CircuitBreakerRegistry>,
        action_map: Arc<IncidentActionMap>,
        validator: Option<Arc<dyn DecisionValidator>>,
        config: DeciderConfig,
    ) -> Self {
        Self { source: source.into(), autonomy_level, policy, cooldown, breaker, action_map, validator, config }
    }

    /// Pure decision formation, before the optional validation overlay.
    #[instrument(skip(self, incident), fields(incident_id = %incident.incident_id, incident_type = %incident.incident_type))]
    pub fn decide(&self, incident: &Incident, now: DateTime<Utc>) -> Decision {
        match self.autonomy_level {
            AutonomyLevel::N0 => self.decide_n0(incident),
            AutonomyLevel::N2 => self.decide_n2(incident, now),
            AutonomyLevel::N3 => self.decide_n3(incident, now),
        }
    }

    fn no_action(&self, incident: &Incident, classification: SafetyClassification, rule: &str) -> Decision {
        Decision::new(
            self.source.clone(),
            incident.incident_id,
            DecisionType::NoAction,
            None,
            classification,
            reasoning::build(&incident.incident_type, rule),
            self.autonomy_level,
            None,
        )
        .expect("reasoning::build always produces >= 10 characters")
    }

    fn decide_n0(&self, incident: &Incident) -> Decision {
        self.no_action(incident, SafetyClassification::Unknown, "N0 observes only; no action is ever taken")
    }

    /// Shared SAFE-path evaluation for N2 and N3: classify, then gate on
    /// cooldown and circuit breaker. Returns `None` when the candidate
    /// action is not SAFE (caller handles RISKY/UNKNOWN per autonomy
    /// level).
    fn try_safe_path(&self, incident: &Incident, action_type: &str, now: DateTime<Utc>) -> Option<Decision> {
        if self.policy.classify(action_type) != SafetyClassification::Safe {
            return None;
        }

        let cooldown_seconds = self.policy.cooldown_seconds(action_type);
        if !self.cooldown.check(action_type, &incident.fingerprint, cooldown_seconds, now) {
            return Some(self.no_action(
                incident,
                SafetyClassification::Safe,
                &format!("action {action_type} blocked by cooldown (rule: cooldown_seconds={cooldown_seconds})"),
            ));
        }

        if self.breaker.check(action_type, now) == CircuitState::Open {
            return Some(self.no_action(
                incident,
                SafetyClassification::Safe,
                &format!("action {action_type} blocked by open circuit breaker (rule: circuit_breaker)"),
            ));
        }

        Some(
            Decision::new(
                self.source.clone(),
                incident.incident_id,
                DecisionType::ExecuteSafeAction,
                Some(action_type.to_string()),
                SafetyClassification::Safe,
                reasoning::build(&incident.incident_type, &format!("action {action_type} is SAFE and not rate-limited")),
                self.autonomy_level,
                None,
            )
            .expect("reasoning::build always produces >= 10 characters"),
        )
    }

    fn decide_n2(&self, incident: &Incident, now: DateTime<Utc>) -> Decision {
        let Some(action_type) = self.action_map.action_for(&incident.incident_type) else {
            return self.no_action(incident, SafetyClassification::Unknown, "no action is mapped for this incident type");
        };

        if let Some(decision) = self.try_safe_path(incident, action_type, now) {
            return decision;
        }

        let classification = self.policy.classify(action_type);
        self.no_action(
            incident,
            classification,
            &format!("action {action_type} is {classification:?} and N2 never executes non-SAFE actions"),
        )
    }

    fn decide_n3(&self, incident: &Incident, now: DateTime<Utc>) -> Decision {
        let Some(action_type) = self.action_map.action_for(&incident.incident_type) else {
            return self.no_action(incident, SafetyClassification::Unknown, "no action is mapped for this incident type");
        };

        if let Some(decision) = self.try_safe_path(incident, action_type, now) {
            return decision;
        }

        // RISKY or UNKNOWN (UNKNOWN is always treated as RISKY, fail-closed).
        let classification = self.policy.classify(action_type);
        let timeout_seconds = self
            .policy
            .approval_policy(action_type)
            .map(|p| p.timeout_seconds)
            .unwrap_or(self.config.default_approval_timeout_seconds);
        let expires_at = now + Duration::seconds(timeout_seconds as i64);

        Decision::new(
            self.source.clone(),
            incident.incident_id,
            DecisionType::RequestApproval,
            Some(action_type.to_string()),
            classification,
            reasoning::build(&incident.incident_type, &format!("action {action_type} is {classification:?}; N3 requires human approval")),
            self.autonomy_level,
            Some(expires_at),
        )
        .expect("reasoning::build always produces >= 10 characters")
    }

    /// Builds the `approval_request` that must accompany a
    /// `REQUEST_APPROVAL` decision on the approval stream. Panics if
    /// `decision.decision_type != RequestApproval` — callers only
    /// invoke this right after `decide` returned that variant.
    pub fn build_approval_request(&self, decision: &Decision) -> ApprovalRequest {
        assert_eq!(decision.decision_type, DecisionType::RequestApproval);
        let action_type = decision.action_type.clone().expect("RequestApproval decisions always carry an action_type");
        let expires_at = decision.expires_at.expect("RequestApproval decisions always carry an expiry");
        ApprovalRequest::new(self.source.clone(), decision.decision_id, action_type, expires_at)
    }

    /// Applies the optional validation overlay: on `Blocked` (or validator
    /// failure, fail-closed), downgrades the decision to `NO_ACTION` with
    /// reasoning referencing the validation record.
    pub async fn apply_validation_overlay(&self, incident: &Incident, decision: Decision) -> Decision {
        let Some(validator) = &self.validator else { return decision };
        if decision.decision_type == DecisionType::NoAction {
            return decision;
        }

        let outcome = validator.validate(&decision).await;
        let blocked_critique = match &outcome {
            Ok(record) if record.result == ValidationResult::Approved => return decision,
            Ok(record) => record.critique.clone(),
            Err(e) => {
                info!(error = %e, "validator unavailable, failing closed");
                format!("validator unavailable: {e}")
            }
        };

        self.no_action(
            incident,
            decision.safety_classification,
            &format!("validation overlay blocked decision: {blocked_critique}"),
        )
    }
}
