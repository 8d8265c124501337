use std::collections::HashMap;
use std::sync::Arc;

use orion_executor::{Executor, ShellCommandHandler};

use crate::config::CommandSpec;

/// Builds a [`ShellCommandHandler`] from every entry in `commands` and
/// registers it on `executor` under its `action_type`.
pub fn register_shell_handlers(executor: &mut Executor, commands: &HashMap<String, CommandSpec>) {
    for (action_type, spec) in commands {
        let mut handler = ShellCommandHandler::new(spec.program.clone(), spec.args.clone());
        if let Some(rollback_program) = &spec.rollback_program {
            handler = handler.with_rollback(rollback_program.clone(), spec.rollback_args.clone());
        }
        executor.register_handler(action_type.clone(), Arc::new(handler));
    }
}
