//! Dead man's switch and safe-state kernel for ORION edge agents.

pub mod agent;
pub mod error;
pub mod safe_state;
pub mod transport;
pub mod watchdog;

pub use agent::{apply_resume, filter_command, resets_watchdog};
pub use error::EdgeError;
pub use safe_state::SafeStateManager;
pub use transport::{command_qos, command_topic, health_qos, health_topic, telemetry_qos, telemetry_topic};
pub use watchdog::DeadMansSwitch;
