use orion_core::{CommandType, EdgeCommand};

use crate::error::EdgeError;
use crate::safe_state::SafeStateManager;
use crate::watchdog::DeadMansSwitch;

/// Filters an incoming command against the current safe-mode state.
///
/// MOVE and CALIBRATE are rejected while in safe mode; STOP, STATUS, and
/// RESUME are always accepted. This does not execute the command — callers
/// dispatch it themselves after this returns `Ok`.
pub fn filter_command(safe_state: &SafeStateManager, command: &EdgeCommand) -> Result<(), EdgeError> {
    if safe_state.is_in_safe_mode() && !command.command_type.accepted_in_safe_mode() {
        return Err(EdgeError::RejectedInSafeMode { command_type: command.command_type });
    }
    Ok(())
}

/// Applies a RESUME command: clears the watchdog's sticky trigger, then
/// exits safe mode, in that order — `clear_triggered` always runs even if
/// `exit_safe_mode` then finds nothing to do, since RESUME is valid (and a
/// no-op) outside safe mode too.
pub fn apply_resume(safe_state: &SafeStateManager, watchdog: &DeadMansSwitch) {
    watchdog.clear_triggered();
    let _ = safe_state.exit_safe_mode();
}

/// Whether `command` should reset the watchdog. The watchdog resets on
/// receipt of *any* valid command, not just accepted ones — a rejected MOVE
/// in safe mode still proves the link is alive.
pub fn resets_watchdog(_command_type: CommandType) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::CommandPriority;
    use std::time::Duration;

    fn safe_state() -> SafeStateManager {
        SafeStateManager::new(|| {}, || {})
    }

    fn command(command_type: CommandType) -> EdgeCommand {
        EdgeCommand::new("orion-decider", command_type, "bot-1", serde_json::Value::Null, CommandPriority::Normal, None)
    }

    #[test]
    fn move_rejected_in_safe_mode() {
        let state = safe_state();
        state.enter_safe_mode();
        let err = filter_command(&state, &command(CommandType::Move)).unwrap_err();
        assert!(matches!(err, EdgeError::RejectedInSafeMode { .. }));
    }

    #[test]
    fn calibrate_rejected_in_safe_mode() {
        let state = safe_state();
        state.enter_safe_mode();
        assert!(filter_command(&state, &command(CommandType::Calibrate)).is_err());
    }

    #[test]
    fn stop_status_resume_always_accepted() {
        let state = safe_state();
        state.enter_safe_mode();
        assert!(filter_command(&state, &command(CommandType::Stop)).is_ok());
        assert!(filter_command(&state, &command(CommandType::Status)).is_ok());
        assert!(filter_command(&state, &command(CommandType::Resume)).is_ok());
    }

    #[test]
    fn move_accepted_outside_safe_mode() {
        let state = safe_state();
        assert!(filter_command(&state, &command(CommandType::Move)).is_ok());
    }

    #[test]
    fn resume_clears_trigger_before_exiting_safe_mode() {
        let state = safe_state();
        state.enter_safe_mode();
        let watchdog = DeadMansSwitch::new(Duration::from_secs(5), || {});
        apply_resume(&state, &watchdog);
        assert!(!watchdog.is_triggered());
        assert!(!state.is_in_safe_mode());
    }
}
