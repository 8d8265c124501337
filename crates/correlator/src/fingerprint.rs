use orion_core::{Event, EventType};
use sha2::{Digest, Sha256};

/// A small, deliberately-chosen subset of `data` that participates in the
/// fingerprint. Only scalar fields that identify "the same situation"
/// belong here — e.g. `service`, `host`, `device` — not free-form detail
/// that would make two occurrences of the same problem hash differently.
const FINGERPRINT_DATA_FIELDS: &[&str] = &["service", "host", "device", "disk", "interface"];

fn event_type_key(event_type: &EventType) -> String {
    match event_type {
        EventType::ServiceUp => "service_up".to_string(),
        EventType::ServiceDown => "service_down".to_string(),
        EventType::ResourceAnomaly => "resource_anomaly".to_string(),
        EventType::DiskPressure => "disk_pressure".to_string(),
        EventType::NetworkPartition => "network_partition".to_string(),
        EventType::CertificateExpiring => "certificate_expiring".to_string(),
        EventType::BackupFailed => "backup_failed".to_string(),
        EventType::Custom(name) => name.clone(),
    }
}

/// Deterministic, 16-hex-character fingerprint of
/// `(event_type, severity, selected fields of data)`. Two events with the
/// same fingerprint are "the same situation" for dedup purposes.
pub fn fingerprint(event: &Event) -> String {
    let mut selected = serde_json::Map::new();
    if let Some(obj) = event.data.as_object() {
        for field in FINGERPRINT_DATA_FIELDS {
            if let Some(value) = obj.get(*field) {
                selected.insert((*field).to_string(), value.clone());
            }
        }
    }

    let canonical = serde_json::json!({
        "event_type": event_type_key(&event.event_type),
        "severity": format!("{:?}", event.severity),
        "data": selected,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::Severity;

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let event = Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "jellyfin"}));
        let fp = fingerprint(&event);
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identical_events_produce_identical_fingerprints() {
        let a = Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "jellyfin"}));
        let b = Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "jellyfin"}));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_services_produce_different_fingerprints() {
        let a = Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "jellyfin"}));
        let b = Event::new("orion-watcher", EventType::ServiceDown, Severity::Error, serde_json::json!({"service": "sonarr"}));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn unselected_data_fields_do_not_affect_fingerprint() {
        let a = Event::new(
            "orion-watcher",
            EventType::ServiceDown,
            Severity::Error,
            serde_json::json!({"service": "jellyfin", "pid": 1234}),
        );
        let b = Event::new(
            "orion-watcher",
            EventType::ServiceDown,
            Severity::Error,
            serde_json::json!({"service": "jellyfin", "pid": 5678}),
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
