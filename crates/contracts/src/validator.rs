use std::collections::HashMap;
use std::path::Path;

use jsonschema::{Validator, ValidationError};
use jsonschema::error::ValidationErrorKind;
use tracing::{debug, instrument};

use crate::error::ContractError;

/// Compiled schemas for every known message type, loaded once at startup.
///
/// Validation is a pure function over `(message, type)`: it never mutates
/// the message and never logs the message body — only the violated
/// constraint and the message type are traced.
pub struct ContractValidator {
    schemas: HashMap<String, Validator>,
}

impl ContractValidator {
    /// Compile every `*.json` schema document in `dir`, keyed by file stem
    /// (e.g. `event.json` registers message type `"event"`).
    pub fn load_directory(dir: &Path) -> Result<Self, ContractError> {
        let mut schemas = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let message_type = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let contents = std::fs::read_to_string(&path)?;
            let schema_doc: serde_json::Value = serde_json::from_str(&contents)?;
            let compiled = jsonschema::validator_for(&schema_doc).map_err(|e| {
                ContractError::SchemaCompile {
                    message_type: message_type.clone(),
                    source: e.to_owned(),
                }
            })?;
            schemas.insert(message_type, compiled);
        }
        Ok(Self { schemas })
    }

    /// Construct from already-compiled validators, mainly for tests that
    /// want to assemble a validator set in-process without touching disk.
    pub fn from_schemas(schemas: HashMap<String, Validator>) -> Self {
        Self { schemas }
    }

    /// Validate `message` against the schema registered for `message_type`.
    ///
    /// Returns the first violated constraint rather than every violation:
    /// callers (the bus) only need to know whether to reject, and a single
    /// structured reason is enough to log and audit.
    #[instrument(skip(self, message), fields(message_type))]
    pub fn validate(&self, message: &serde_json::Value, message_type: &str) -> Result<(), ContractError> {
        let validator = self
            .schemas
            .get(message_type)
            .ok_or_else(|| ContractError::UnknownMessageType(message_type.to_string()))?;

        match validator.validate(message) {
            Ok(()) => Ok(()),
            Err(error) => {
                let classified = classify(&error);
                debug!(message_type, error = %classified, "contract validation failed");
                Err(classified)
            }
        }
    }

    pub fn known_message_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

fn classify(error: &ValidationError<'_>) -> ContractError {
    let field = error.instance_path.to_string();
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            ContractError::MissingField(property.to_string())
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            ContractError::UnknownField(unexpected.join(", "))
        }
        ValidationErrorKind::Enum { .. } => ContractError::EnumMismatch {
            field,
            value: error.instance.to_string(),
        },
        ValidationErrorKind::Pattern { pattern } => ContractError::PatternMismatch {
            field,
            value: pattern.clone(),
        },
        ValidationErrorKind::Type { kind } => ContractError::TypeMismatch {
            field,
            detail: format!("{kind:?}"),
        },
        ValidationErrorKind::Constant { expected } if field.ends_with("/version") => {
            ContractError::VersionMismatch {
                expected: expected.to_string(),
                actual: error.instance.to_string(),
            }
        }
        _ => ContractError::TypeMismatch {
            field,
            detail: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_schema(dir: &tempfile::TempDir, name: &str, schema: serde_json::Value) {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(path).unwrap();
        write!(file, "{schema}").unwrap();
    }

    fn event_schema() -> serde_json::Value {
        serde_json::json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "additionalProperties": false,
            "required": ["version", "event_id", "timestamp", "source", "event_type", "severity", "data"],
            "properties": {
                "version": {"const": "1.0"},
                "event_id": {"type": "string"},
                "timestamp": {"type": "string"},
                "source": {"type": "string", "pattern": "^orion-[a-z0-9-]+$"},
                "event_type": {"type": "string"},
                "severity": {"enum": ["info", "warning", "error", "critical"]},
                "data": {"type": "object"}
            }
        })
    }

    #[test]
    fn validates_a_well_formed_event() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "event.json", event_schema());
        let validator = ContractValidator::load_directory(dir.path()).unwrap();

        let message = serde_json::json!({
            "version": "1.0",
            "event_id": "e1",
            "timestamp": "2026-01-01T00:00:00Z",
            "source": "orion-watcher-systemd",
            "event_type": "service_down",
            "severity": "error",
            "data": {}
        });
        assert!(validator.validate(&message, "event").is_ok());
    }

    #[test]
    fn rejects_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "event.json", event_schema());
        let validator = ContractValidator::load_directory(dir.path()).unwrap();

        let message = serde_json::json!({
            "version": "1.0",
            "event_id": "e1",
            "timestamp": "2026-01-01T00:00:00Z",
            "source": "orion-watcher-systemd",
            "event_type": "service_down",
            "severity": "error",
            "data": {},
            "surprise": true
        });
        let err = validator.validate(&message, "event").unwrap_err();
        assert!(matches!(err, ContractError::UnknownField(_)));
    }

    #[test]
    fn rejects_bad_severity_enum() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "event.json", event_schema());
        let validator = ContractValidator::load_directory(dir.path()).unwrap();

        let message = serde_json::json!({
            "version": "1.0",
            "event_id": "e1",
            "timestamp": "2026-01-01T00:00:00Z",
            "source": "orion-watcher-systemd",
            "event_type": "service_down",
            "severity": "apocalyptic",
            "data": {}
        });
        let err = validator.validate(&message, "event").unwrap_err();
        assert!(matches!(err, ContractError::EnumMismatch { .. }));
    }

    #[test]
    fn rejects_unregistered_message_type() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "event.json", event_schema());
        let validator = ContractValidator::load_directory(dir.path()).unwrap();

        let err = validator.validate(&serde_json::json!({}), "incident").unwrap_err();
        assert!(matches!(err, ContractError::UnknownMessageType(_)));
    }

    #[test]
    fn known_message_types_lists_loaded_schemas() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "event.json", event_schema());
        let validator = ContractValidator::load_directory(dir.path()).unwrap();
        let types: Vec<&str> = validator.known_message_types().collect();
        assert_eq!(types, vec!["event"]);
    }
}
