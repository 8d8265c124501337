use async_trait::async_trait;
use orion_core::{Decision, ValidationRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator timed out")]
    Timeout,
    #[error("validator transport error: {0}")]
    Transport(String),
}

/// Optional advisory overlay consulted after the decider forms a
/// `EXECUTE_SAFE_ACTION` or `REQUEST_APPROVAL` decision. Disabled by
/// default; when present, a `Blocked` result downgrades the decision to
/// `NO_ACTION`. Any [`ValidatorError`] is treated as `Blocked` by the call
/// site, fail-closed — this trait only reports the failure, it never
/// decides the fallback itself.
#[async_trait]
pub trait DecisionValidator: Send + Sync {
    async fn validate(&self, decision: &Decision) -> Result<ValidationRecord, ValidatorError>;
}
