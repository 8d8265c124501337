use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("force_transition requires N3 autonomy")]
    ForceTransitionRequiresN3,

    #[error("failed to audit forced circuit breaker transition: {0}")]
    Audit(#[from] orion_audit::AuditError),
}
