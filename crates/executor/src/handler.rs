use async_trait::async_trait;
use orion_core::Action;

/// A concrete side effect the executor can dispatch, keyed by `action_type`.
///
/// Implementations perform the actual work (reboot a host, clear a disk,
/// acknowledge an incident in a paging system, ...). The executor never
/// invents an action type of its own: an action with no registered handler
/// is an `UnknownActionType` failure, not a default no-op.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Performs the action. `Err` triggers the declared rollback.
    async fn execute(&self, action: &Action) -> Result<serde_json::Value, String>;

    /// Best-effort compensation for a failed [`execute`](Self::execute).
    /// Most actions have nothing to undo; the default is a no-op.
    async fn rollback(&self, _action: &Action) -> Result<(), String> {
        Ok(())
    }
}
