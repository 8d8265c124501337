use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("no handler registered for action_type {action_type:?}")]
    UnknownActionType { action_type: String },

    #[error("action_type {action_type:?} is no longer SAFE under current policy")]
    ClassificationMismatch { action_type: String },

    #[error("approval invalid: {reason}")]
    ApprovalInvalid { reason: String },
}
