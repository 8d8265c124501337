use parking_lot::Mutex;

use crate::error::EdgeError;

/// Binary safe/not-safe state with idempotent entry and guarded exit.
/// `on_enter`/`on_exit` are synchronous from this type's perspective — the
/// actual kinematics (legs folded, body lowered) are a callback the manager
/// invokes and waits on, not something it models itself.
pub struct SafeStateManager {
    in_safe_mode: Mutex<bool>,
    on_enter: Box<dyn Fn() + Send + Sync>,
    on_exit: Box<dyn Fn() + Send + Sync>,
}

impl SafeStateManager {
    pub fn new(
        on_enter: impl Fn() + Send + Sync + 'static,
        on_exit: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self { in_safe_mode: Mutex::new(false), on_enter: Box::new(on_enter), on_exit: Box::new(on_exit) }
    }

    /// Idempotent: invokes `on_enter` only on the first transition into
    /// safe mode.
    pub fn enter_safe_mode(&self) {
        let mut guard = self.in_safe_mode.lock();
        if !*guard {
            *guard = true;
            (self.on_enter)();
        }
    }

    /// Valid only while in safe mode; invokes `on_exit` and clears the flag.
    pub fn exit_safe_mode(&self) -> Result<(), EdgeError> {
        let mut guard = self.in_safe_mode.lock();
        if !*guard {
            return Err(EdgeError::NotInSafeMode);
        }
        *guard = false;
        (self.on_exit)();
        Ok(())
    }

    pub fn is_in_safe_mode(&self) -> bool {
        *self.in_safe_mode.lock()
    }
}
