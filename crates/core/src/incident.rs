use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, new_id};
use crate::severity::Severity;

/// The `[start, end)` window a correlator collapsed one or more events into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct CorrelationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CorrelationWindow {
    /// Duration of the window. Callers assert this against the configured
    /// maximum; the type itself does not enforce a bound since the bound is
    /// configuration, not an invariant of the data shape.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// A correlated situation: one or more deduplicated events grouped within a
/// bounded time window.
///
/// Invariants enforced by the correlator that produces these: `event_ids`
/// is never empty, `correlation_window.end > start`, and the window
/// duration never exceeds the configured maximum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Incident {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub incident_id: Uuid,
    pub incident_type: String,
    pub severity: Severity,
    pub correlation_window: CorrelationWindow,
    pub event_ids: Vec<Uuid>,
    /// Stable content hash used for dedup, 16 hex characters.
    pub fingerprint: String,
}

impl Incident {
    pub fn new(
        source: impl Into<String>,
        incident_type: impl Into<String>,
        severity: Severity,
        window: CorrelationWindow,
        event_ids: Vec<Uuid>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(source),
            incident_id: new_id(),
            incident_type: incident_type.into(),
            severity,
            correlation_window: window,
            event_ids,
            fingerprint: fingerprint.into(),
        }
    }

    /// `true` iff this incident satisfies its output invariants. Used by
    /// tests and by the correlator's own debug assertions before publish.
    pub fn satisfies_invariants(&self, max_window: chrono::Duration) -> bool {
        !self.event_ids.is_empty()
            && self.correlation_window.end > self.correlation_window.start
            && self.correlation_window.duration() <= max_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn window(secs: i64) -> CorrelationWindow {
        let start = Utc::now();
        CorrelationWindow { start, end: start + Duration::seconds(secs) }
    }

    #[test]
    fn incident_satisfies_invariants_when_well_formed() {
        let incident = Incident::new(
            "orion-correlator",
            "service_down",
            crate::severity::Severity::Error,
            window(30),
            vec![new_id()],
            "abcdef0123456789",
        );
        assert!(incident.satisfies_invariants(Duration::seconds(60)));
    }

    #[test]
    fn incident_violates_invariants_with_no_events() {
        let incident = Incident::new(
            "orion-correlator",
            "service_down",
            crate::severity::Severity::Error,
            window(30),
            vec![],
            "abcdef0123456789",
        );
        assert!(!incident.satisfies_invariants(Duration::seconds(60)));
    }

    #[test]
    fn incident_violates_invariants_when_window_exceeds_max() {
        let incident = Incident::new(
            "orion-correlator",
            "service_down",
            crate::severity::Severity::Error,
            window(120),
            vec![new_id()],
            "abcdef0123456789",
        );
        assert!(!incident.satisfies_invariants(Duration::seconds(60)));
    }
}
