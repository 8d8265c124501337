//! Action dispatch and outcome emission for ORION.

pub mod dlq;
pub mod error;
pub mod executor;
pub mod handler;
pub mod shell;

pub use dlq::{DeadLetterEntry, DeadLetterQueue};
pub use error::ExecutorError;
pub use executor::{ApprovalCheck, Executor};
pub use handler::ActionHandler;
pub use shell::ShellCommandHandler;
