use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use orion_core::{CorrelationWindow, Event, Incident};
use tracing::{debug, info};

use crate::fingerprint::fingerprint;

/// Configuration for one correlator instance.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Window length granted to a new incident, and the increment an
    /// in-window event extends `last_seen` by.
    pub correlation_window: Duration,
    /// Hard cap on how far a window may be extended past its start. Equal
    /// to `correlation_window` by default, which yields a fixed (rather
    /// than extensible) window.
    pub max_window: Duration,
    /// FIFO capacity of the recent-event-id buffer, default 100.
    pub buffer_capacity: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        let correlation_window = Duration::seconds(60);
        Self {
            correlation_window,
            max_window: correlation_window,
            buffer_capacity: 100,
        }
    }
}

struct OpenIncident {
    start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    event_ids: Vec<uuid::Uuid>,
    severity: orion_core::Severity,
    incident_type: String,
}

/// Deduplicates events by fingerprint and groups them into bounded-window
/// incidents. Owned by a single task; not `Send`-shared across tasks —
/// callers run it behind one long-lived control loop.
pub struct Correlator {
    config: CorrelatorConfig,
    open: HashMap<String, OpenIncident>,
    buffer: VecDeque<uuid::Uuid>,
}

fn incident_type_for(event: &Event) -> String {
    match &event.event_type {
        orion_core::EventType::ServiceUp => "service_up".to_string(),
        orion_core::EventType::ServiceDown => "service_down".to_string(),
        orion_core::EventType::ResourceAnomaly => "resource_anomaly".to_string(),
        orion_core::EventType::DiskPressure => "disk_pressure".to_string(),
        orion_core::EventType::NetworkPartition => "network_partition".to_string(),
        orion_core::EventType::CertificateExpiring => "certificate_expiring".to_string(),
        orion_core::EventType::BackupFailed => "backup_failed".to_string(),
        orion_core::EventType::Custom(name) => name.clone(),
    }
}

impl Correlator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self { config, open: HashMap::new(), buffer: VecDeque::new() }
    }

    /// Absorb one event: either extends an open incident with matching
    /// fingerprint, or opens a new one. Never emits directly — incidents are
    /// only produced by [`Correlator::sweep`], so replays of identical
    /// events within the window are absorbed for free.
    pub fn ingest(&mut self, now: DateTime<Utc>, event: &Event) {
        let fp = fingerprint(event);

        if self.buffer.len() >= self.config.buffer_capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event.event_id);

        if let Some(open) = self.open.get_mut(&fp) {
            if open.window_end > now {
                open.event_ids.push(event.event_id);
                let extended = now + self.config.correlation_window;
                let cap = open.start + self.config.max_window;
                open.window_end = extended.min(cap);
                debug!(fingerprint = %fp, window_end = %open.window_end, "extended open incident");
                return;
            }
            // Window already passed; the sweep just hasn't run yet. Fall
            // through and treat this as a fresh incident.
        }

        self.open.insert(
            fp.clone(),
            OpenIncident {
                start: now,
                window_end: now + self.config.correlation_window,
                event_ids: vec![event.event_id],
                severity: event.severity,
                incident_type: incident_type_for(event),
            },
        );
        debug!(fingerprint = %fp, "opened new incident");
    }

    /// Close every incident whose window has ended as of `now`, returning
    /// them for publish. Called from the same task's select loop on a
    /// `correlation_window`-granularity tick.
    pub fn sweep(&mut self, now: DateTime<Utc>, source: &str) -> Vec<Incident> {
        let expired: Vec<String> = self
            .open
            .iter()
            .filter(|(_, incident)| incident.window_end <= now)
            .map(|(fp, _)| fp.clone())
            .collect();

        let mut closed = Vec::with_capacity(expired.len());
        for fp in expired {
            let Some(open) = self.open.remove(&fp) else { continue };
            let incident = Incident::new(
                source,
                open.incident_type,
                open.severity,
                CorrelationWindow { start: open.start, end: open.window_end },
                open.event_ids,
                fp,
            );
            info!(incident_id = %incident.incident_id, "closed incident");
            closed.push(incident);
        }
        closed
    }

    pub fn open_incident_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::{EventType, Severity};

    fn make_event(service: &str) -> Event {
        Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": service}))
    }

    #[test]
    fn duplicate_events_within_window_collapse_into_one_incident() {
        let mut correlator = Correlator::new(CorrelatorConfig::default());
        let now = Utc::now();
        correlator.ingest(now, &make_event("jellyfin"));
        correlator.ingest(now + Duration::seconds(5), &make_event("jellyfin"));

        let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].event_ids.len(), 2);
    }

    #[test]
    fn distinct_fingerprints_produce_distinct_incidents() {
        let mut correlator = Correlator::new(CorrelatorConfig::default());
        let now = Utc::now();
        correlator.ingest(now, &make_event("jellyfin"));
        correlator.ingest(now, &make_event("sonarr"));

        let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
        assert_eq!(closed.len(), 2);
    }

    #[test]
    fn sweep_before_window_end_closes_nothing() {
        let mut correlator = Correlator::new(CorrelatorConfig::default());
        let now = Utc::now();
        correlator.ingest(now, &make_event("jellyfin"));

        let closed = correlator.sweep(now + Duration::seconds(10), "orion-correlator");
        assert!(closed.is_empty());
        assert_eq!(correlator.open_incident_count(), 1);
    }

    #[test]
    fn window_never_extends_past_max_window() {
        let mut config = CorrelatorConfig::default();
        config.correlation_window = Duration::seconds(60);
        config.max_window = Duration::seconds(90);
        let mut correlator = Correlator::new(config);
        let now = Utc::now();

        correlator.ingest(now, &make_event("jellyfin"));
        // Extend repeatedly; window_end should never exceed start + 90s.
        correlator.ingest(now + Duration::seconds(50), &make_event("jellyfin"));
        correlator.ingest(now + Duration::seconds(80), &make_event("jellyfin"));

        let closed = correlator.sweep(now + Duration::seconds(200), "orion-correlator");
        assert_eq!(closed.len(), 1);
        assert!(closed[0].correlation_window.duration() <= Duration::seconds(90));
    }

    #[test]
    fn every_emitted_incident_satisfies_output_invariants() {
        let mut correlator = Correlator::new(CorrelatorConfig::default());
        let now = Utc::now();
        correlator.ingest(now, &make_event("jellyfin"));
        let closed = correlator.sweep(now + Duration::seconds(120), "orion-correlator");
        assert!(closed[0].satisfies_invariants(Duration::seconds(60)));
    }
}
