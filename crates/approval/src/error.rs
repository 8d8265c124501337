use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("no pending approval request {request_id}")]
    UnknownRequest { request_id: uuid::Uuid },

    #[error("audit append failed: {0}")]
    Audit(#[from] orion_audit::AuditError),

    #[error("failed to serialize approval decision: {0}")]
    Serialization(#[from] serde_json::Error),
}
