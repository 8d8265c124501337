use std::sync::Mutex;

use chrono::{DateTime, Utc};
use orion_core::Action;

/// A permanently failed action, kept for operator inspection.
///
/// This is an observability sink, not a retry queue: the executor never
/// automatically retries — anything that lands here needs a human or an
/// upstream re-emission to try again.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub action: Action,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory dead-letter queue. Append-only from the executor's point of
/// view; `drain` exists for the CLI inspection surface and tests.
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, action: Action, error: String) {
        let entry = DeadLetterEntry { action, error, recorded_at: Utc::now() };
        self.entries.lock().expect("dlq mutex poisoned").push(entry);
    }

    pub fn drain(&self) -> Vec<DeadLetterEntry> {
        let mut guard = self.entries.lock().expect("dlq mutex poisoned");
        std::mem::take(&mut *guard)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dlq mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new()
    }
}
