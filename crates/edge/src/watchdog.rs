use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A scalar timer with timeout `T` and a one-shot `on_trigger` callback.
/// Triggering is idempotent and sticky: once fired, `reset` is a no-op
/// until `clear_triggered` re-arms it.
///
/// The callback must not block — it fires from the watcher's own task, not
/// from whatever task is doing bus I/O, and it is expected to schedule a
/// safe-mode transition rather than perform one synchronously over the
/// network.
pub struct DeadMansSwitch {
    timeout: Duration,
    deadline: Mutex<Instant>,
    triggered: AtomicBool,
    on_trigger: Box<dyn Fn() + Send + Sync>,
}

impl DeadMansSwitch {
    pub fn new(timeout: Duration, on_trigger: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            deadline: Mutex::new(Instant::now() + timeout),
            triggered: AtomicBool::new(false),
            on_trigger: Box::new(on_trigger),
        })
    }

    /// Restarts the timer to `T` from now. A no-op while triggered.
    pub fn reset(&self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        *self.deadline.lock() = Instant::now() + self.timeout;
    }

    /// Clears the sticky trigger and re-arms the timer. Callers must only
    /// invoke this in response to an explicit RESUME command.
    pub fn clear_triggered(&self) {
        self.triggered.store(false, Ordering::SeqCst);
        *self.deadline.lock() = Instant::now() + self.timeout;
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Milliseconds remaining before expiry; `0` once triggered or expired.
    pub fn remaining_ms(&self) -> u64 {
        if self.triggered.load(Ordering::SeqCst) {
            return 0;
        }
        let deadline = *self.deadline.lock();
        let now = Instant::now();
        if deadline <= now { 0 } else { (deadline - now).as_millis() as u64 }
    }

    /// Spawns the watcher task. Cancel `cancel` to stop it; dropping the
    /// returned handle does not stop the watcher, only `cancel` does.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.watch(cancel).await })
    }

    async fn watch(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let deadline = *self.deadline.lock();
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {
                    if self.triggered.load(Ordering::SeqCst) {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                    let current_deadline = *self.deadline.lock();
                    if Instant::now() >= current_deadline
                        && !self.triggered.swap(true, Ordering::SeqCst)
                    {
                        warn!("dead man's switch expired, triggering safe mode");
                        (self.on_trigger)();
                    }
                }
            }
        }
    }
}
