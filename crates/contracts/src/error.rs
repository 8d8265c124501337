/// Violations a contract validator can report, named after the specific
/// constraint that failed rather than collapsed into one generic variant —
/// callers (the bus, tests) match on these to decide how to log or react.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("no schema registered for message type {0:?}")]
    UnknownMessageType(String),

    #[error("message missing required field: {0}")]
    MissingField(String),

    #[error("message has field not permitted by schema: {0}")]
    UnknownField(String),

    #[error("field {field} does not match enum constraint: {value}")]
    EnumMismatch { field: String, value: String },

    #[error("field {field} does not match pattern: {value}")]
    PatternMismatch { field: String, value: String },

    #[error("field {field} has wrong type: {detail}")]
    TypeMismatch { field: String, detail: String },

    #[error("envelope version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("failed to compile schema for {message_type}: {source}")]
    SchemaCompile {
        message_type: String,
        #[source]
        source: jsonschema::ValidationError<'static>,
    },

    #[error("schema directory io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema document is not valid JSON: {0}")]
    InvalidSchemaJson(#[from] serde_json::Error),
}
