use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use orion_audit::AuditStore;
use orion_core::AutonomyLevel;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::RateLimitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::seconds(300),
            open_duration: Duration::seconds(600),
        }
    }
}

#[derive(Debug, Clone)]
struct CircuitData {
    state: CircuitState,
    failures: VecDeque<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

impl Default for CircuitData {
    fn default() -> Self {
        Self { state: CircuitState::Closed, failures: VecDeque::new(), opened_at: None, probe_in_flight: false }
    }
}

fn prune(failures: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    while let Some(oldest) = failures.front() {
        if now - *oldest > window {
            failures.pop_front();
        } else {
            break;
        }
    }
}

/// One circuit breaker per `action_type`, counting failures within a
/// rolling `failure_window` rather than consecutively (see DESIGN.md for
/// the rationale).
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, CircuitData>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    /// Returns the effective state for `action_type`, transitioning
    /// `Open` -> `HalfOpen` once `open_duration` has elapsed. A `HalfOpen`
    /// check reserves the single in-flight probe slot; subsequent calls
    /// while a probe is outstanding see `Open`.
    pub fn check(&self, action_type: &str, now: DateTime<Utc>) -> CircuitState {
        let mut entry = self.breakers.entry(action_type.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => CircuitState::Closed,
            CircuitState::Open => {
                let elapsed = entry.opened_at.map_or(Duration::zero(), |t| now - t);
                if elapsed >= self.config.open_duration {
                    entry.state = CircuitState::HalfOpen;
                    entry.probe_in_flight = true;
                    debug!(action_type, "circuit breaker transitioning to half-open");
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
            CircuitState::HalfOpen => {
                if entry.probe_in_flight {
                    CircuitState::Open
                } else {
                    entry.probe_in_flight = true;
                    CircuitState::HalfOpen
                }
            }
        }
    }

    /// A single success in `HalfOpen` closes the circuit; in `Closed` it
    /// clears the failure window.
    pub fn record_success(&self, action_type: &str) {
        let mut entry = self.breakers.entry(action_type.to_string()).or_default();
        match entry.state {
            CircuitState::HalfOpen => {
                info!(action_type, "circuit breaker closing after successful probe");
                *entry = CircuitData::default();
            }
            CircuitState::Closed => {
                entry.failures.clear();
            }
            CircuitState::Open => {}
        }
    }

    /// A single failure in `HalfOpen` reopens immediately; in `Closed` it
    /// opens once `failure_threshold` failures fall within `failure_window`.
    pub fn record_failure(&self, action_type: &str, now: DateTime<Utc>) {
        let mut entry = self.breakers.entry(action_type.to_string()).or_default();
        match entry.state {
            CircuitState::HalfOpen => {
                info!(action_type, "circuit breaker reopening after failed probe");
                entry.state = CircuitState::Open;
                entry.opened_at = Some(now);
                entry.probe_in_flight = false;
                entry.failures.clear();
                entry.failures.push_back(now);
            }
            CircuitState::Closed => {
                entry.failures.push_back(now);
                prune(&mut entry.failures, now, self.config.failure_window);
                if entry.failures.len() as u32 >= self.config.failure_threshold {
                    info!(
                        action_type,
                        failures = entry.failures.len(),
                        "circuit breaker opening"
                    );
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(now);
                }
            }
            CircuitState::Open => {
                entry.opened_at = Some(now);
            }
        }
    }

    pub fn state(&self, action_type: &str) -> CircuitState {
        self.breakers.get(action_type).map(|e| e.state).unwrap_or(CircuitState::Closed)
    }

    /// Administrator override, N3 only. Writes an audit record before
    /// returning, regardless of outcome.
    pub async fn force_transition(
        &self,
        action_type: &str,
        target: CircuitState,
        autonomy: AutonomyLevel,
        operator_id: &str,
        reason: &str,
        audit: &AuditStore,
    ) -> Result<(), RateLimitError> {
        if autonomy != AutonomyLevel::N3 {
            audit
                .record(
                    "circuit_breaker",
                    serde_json::json!({
                        "action_type": action_type,
                        "target": target,
                        "operator_id": operator_id,
                        "reason": reason,
                        "result": "rejected_autonomy_level",
                    }),
                )
                .await?;
            return Err(RateLimitError::ForceTransitionRequiresN3);
        }

        let mut entry = self.breakers.entry(action_type.to_string()).or_default();
        entry.state = target;
        entry.probe_in_flight = false;
        entry.opened_at = if target == CircuitState::Open { Some(Utc::now()) } else { None };
        if target == CircuitState::Closed {
            entry.failures.clear();
        }
        drop(entry);

        audit
            .record(
                "circuit_breaker",
                serde_json::json!({
                    "action_type": action_type,
                    "target": target,
                    "operator_id": operator_id,
                    "reason": reason,
                    "result": "applied",
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::seconds(300),
            open_duration: Duration::seconds(600),
        }
    }

    #[test]
    fn starts_closed() {
        let reg = CircuitBreakerRegistry::new(config());
        assert_eq!(reg.check("reboot_host", Utc::now()), CircuitState::Closed);
    }

    #[test]
    fn opens_after_threshold_failures_within_window() {
        let reg = CircuitBreakerRegistry::new(config());
        let now = Utc::now();
        reg.record_failure("reboot_host", now);
        reg.record_failure("reboot_host", now + Duration::seconds(10));
        assert_eq!(reg.state("reboot_host"), CircuitState::Closed);
        reg.record_failure("reboot_host", now + Duration::seconds(20));
        assert_eq!(reg.state("reboot_host"), CircuitState::Open);
    }

    #[test]
    fn failures_outside_window_do_not_accumulate() {
        let reg = CircuitBreakerRegistry::new(config());
        let now = Utc::now();
        reg.record_failure("reboot_host", now);
        reg.record_failure("reboot_host", now + Duration::seconds(10));
        // Third failure arrives after the window has rolled past the first two.
        reg.record_failure("reboot_host", now + Duration::seconds(400));
        assert_eq!(reg.state("reboot_host"), CircuitState::Closed);
    }

    #[test]
    fn half_open_single_probe_then_close_on_success() {
        let reg = CircuitBreakerRegistry::new(config());
        let now = Utc::now();
        for i in 0..3 {
            reg.record_failure("reboot_host", now + Duration::seconds(i));
        }
        assert_eq!(reg.state("reboot_host"), CircuitState::Open);

        let after_open = now + Duration::seconds(700);
        assert_eq!(reg.check("reboot_host", after_open), CircuitState::HalfOpen);
        // A second concurrent check sees Open, not a second probe slot.
        assert_eq!(reg.check("reboot_host", after_open), CircuitState::Open);

        reg.record_success("reboot_host");
        assert_eq!(reg.state("reboot_host"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let reg = CircuitBreakerRegistry::new(config());
        let now = Utc::now();
        for i in 0..3 {
            reg.record_failure("reboot_host", now + Duration::seconds(i));
        }
        let after_open = now + Duration::seconds(700);
        reg.check("reboot_host", after_open);
        reg.record_failure("reboot_host", after_open);
        assert_eq!(reg.state("reboot_host"), CircuitState::Open);
    }

    #[test]
    fn distinct_action_types_are_independent() {
        let reg = CircuitBreakerRegistry::new(config());
        let now = Utc::now();
        for i in 0..3 {
            reg.record_failure("reboot_host", now + Duration::seconds(i));
        }
        assert_eq!(reg.state("reboot_host"), CircuitState::Open);
        assert_eq!(reg.state("replace_disk"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn force_transition_rejected_outside_n3() {
        let reg = CircuitBreakerRegistry::new(config());
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditStore::new(dir.path());
        let err = reg
            .force_transition("reboot_host", CircuitState::Closed, AutonomyLevel::N2, "op1", "test", &audit)
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::ForceTransitionRequiresN3));
    }

    #[tokio::test]
    async fn force_transition_applies_and_audits_at_n3() {
        let reg = CircuitBreakerRegistry::new(config());
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditStore::new(dir.path());
        let now = Utc::now();
        for i in 0..3 {
            reg.record_failure("reboot_host", now + Duration::seconds(i));
        }
        assert_eq!(reg.state("reboot_host"), CircuitState::Open);

        reg.force_transition("reboot_host", CircuitState::Closed, AutonomyLevel::N3, "op1", "manual recovery", &audit)
            .await
            .unwrap();
        assert_eq!(reg.state("reboot_host"), CircuitState::Closed);
        audit.verify_chain("circuit_breaker").await.unwrap();
    }
}
