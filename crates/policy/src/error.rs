use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy document {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse policy document {path}: {source}")]
    Parse { path: String, source: serde_yaml_ng::Error },

    #[error("action_type {action_type:?} appears in both the SAFE and RISKY lists")]
    OverlappingClassification { action_type: String },

    #[error("RISKY action_type {action_type:?} has no approval policy")]
    MissingApprovalPolicy { action_type: String },

    #[error("approval policy for {action_type:?} has timeout_seconds {timeout_seconds}, exceeding the 3600s maximum")]
    ApprovalTimeoutTooLarge { action_type: String, timeout_seconds: u64 },
}
