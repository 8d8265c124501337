use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawMap {
    #[serde(flatten)]
    incident_to_action: HashMap<String, String>,
}

/// Maps an incident's `incident_type` to the candidate `action_type` the
/// decider should evaluate against policy. This mapping is deployment
/// configuration, not something the `Incident` type itself carries.
#[derive(Debug, Clone, Default)]
pub struct IncidentActionMap {
    by_incident_type: HashMap<String, String>,
}

impl IncidentActionMap {
    pub fn from_map(by_incident_type: HashMap<String, String>) -> Self {
        Self { by_incident_type }
    }

    pub fn load_file(path: &Path) -> Result<Self, ActionMapError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ActionMapError::Io { path: path.display().to_string(), source: e })?;
        let raw: RawMap = serde_yaml_ng::from_str(&contents)
            .map_err(|e| ActionMapError::Parse { path: path.display().to_string(), source: e })?;
        Ok(Self { by_incident_type: raw.incident_to_action })
    }

    pub fn action_for(&self, incident_type: &str) -> Option<&str> {
        self.by_incident_type.get(incident_type).map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionMapError {
    #[error("failed to read incident action map {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse incident action map {path}: {source}")]
    Parse { path: String, source: serde_yaml_ng::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_incident_type() {
        let mut map = HashMap::new();
        map.insert("service_down".to_string(), "restart_service".to_string());
        let action_map = IncidentActionMap::from_map(map);
        assert_eq!(action_map.action_for("service_down"), Some("restart_service"));
    }

    #[test]
    fn unknown_incident_type_has_no_candidate_action() {
        let action_map = IncidentActionMap::default();
        assert_eq!(action_map.action_for("service_down"), None);
    }

    #[test]
    fn load_file_parses_flat_yaml_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incident_actions.yaml");
        std::fs::write(&path, "service_down: restart_service\ndisk_pressure: clear_temp_files\n").unwrap();
        let action_map = IncidentActionMap::load_file(&path).unwrap();
        assert_eq!(action_map.action_for("disk_pressure"), Some("clear_temp_files"));
    }
}
