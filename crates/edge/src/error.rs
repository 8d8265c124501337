use orion_core::CommandType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("exit_safe_mode called while not in safe mode")]
    NotInSafeMode,

    #[error("command {command_type:?} is rejected while in safe mode")]
    RejectedInSafeMode { command_type: CommandType },
}
