use std::time::Duration;

use async_trait::async_trait;
use orion_core::Action;
use tokio::process::Command;
use tracing::{info, warn};

use crate::handler::ActionHandler;

/// Runs a configured host command for one `action_type`, substituting
/// `{param}` placeholders in each argument from the action's `parameters`
/// object.
///
/// This is the "real" provider behind the executor's provider-dispatch
/// pattern for actions whose side effect is a host command
/// (`systemctl restart`, `logrotate`, `ip link set`, ...) rather than a
/// call into another ORION component.
pub struct ShellCommandHandler {
    program: String,
    args: Vec<String>,
    rollback: Option<(String, Vec<String>)>,
    timeout: Duration,
}

impl ShellCommandHandler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, rollback: None, timeout: Duration::from_secs(30) }
    }

    #[must_use]
    pub fn with_rollback(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.rollback = Some((program.into(), args));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn substitute(&self, template: &[String], parameters: &serde_json::Value) -> Vec<String> {
        let Some(object) = parameters.as_object() else { return template.to_vec() };
        template
            .iter()
            .map(|arg| {
                let mut resolved = arg.clone();
                for (key, value) in object {
                    let placeholder = format!("{{{key}}}");
                    if resolved.contains(&placeholder) {
                        let replacement = match value {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        resolved = resolved.replace(&placeholder, &replacement);
                    }
                }
                resolved
            })
            .collect()
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<serde_json::Value, String> {
        let output = tokio::time::timeout(self.timeout, Command::new(program).args(args).output())
            .await
            .map_err(|_| format!("command {program} timed out after {:?}", self.timeout))?
            .map_err(|e| format!("failed to spawn {program}: {e}"))?;

        if output.status.success() {
            Ok(serde_json::json!({ "stdout": String::from_utf8_lossy(&output.stdout) }))
        } else {
            Err(format!("{program} exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)))
        }
    }
}

#[async_trait]
impl ActionHandler for ShellCommandHandler {
    async fn execute(&self, action: &Action) -> Result<serde_json::Value, String> {
        let args = self.substitute(&self.args, &action.parameters);
        info!(program = %self.program, ?args, "running shell action handler");
        self.run(&self.program, &args).await
    }

    async fn rollback(&self, action: &Action) -> Result<(), String> {
        let Some((program, template)) = &self.rollback else { return Ok(()) };
        let args = self.substitute(template, &action.parameters);
        warn!(program = %program, ?args, "running rollback command");
        self.run(program, &args).await.map(|_| ())
    }
}
