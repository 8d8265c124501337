//! Human-approval state machine for RISKY decisions.

pub mod coordinator;
pub mod error;

pub use coordinator::{ApprovalCoordinator, ApprovalState, ResolveOutcome};
pub use error::ApprovalError;
