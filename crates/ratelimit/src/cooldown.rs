use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Tracks the last successful-execution timestamp per `(action_type, scope)`
/// pair. Zero cooldown always allows.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_executed: DashMap<(String, String), DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff `now - last >= cooldown_seconds` (or there is no prior
    /// record). Does not itself record anything — callers call
    /// [`CooldownTracker::record`] once the outcome of the action is known.
    pub fn check(&self, action_type: &str, scope: &str, cooldown_seconds: u64, now: DateTime<Utc>) -> bool {
        if cooldown_seconds == 0 {
            return true;
        }
        let key = (action_type.to_string(), scope.to_string());
        match self.last_executed.get(&key) {
            Some(last) => (now - *last).num_seconds() >= cooldown_seconds as i64,
            None => true,
        }
    }

    pub fn record(&self, action_type: &str, scope: &str, now: DateTime<Utc>) {
        self.last_executed.insert((action_type.to_string(), scope.to_string()), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zero_cooldown_always_allows() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.record("restart_service", "jellyfin", now);
        assert!(tracker.check("restart_service", "jellyfin", 0, now));
    }

    #[test]
    fn blocks_within_cooldown_window() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.record("restart_service", "jellyfin", now);
        assert!(!tracker.check("restart_service", "jellyfin", 300, now + Duration::seconds(100)));
        assert!(tracker.check("restart_service", "jellyfin", 300, now + Duration::seconds(300)));
    }

    #[test]
    fn distinct_scopes_have_independent_cooldowns() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.record("restart_service", "jellyfin", now);
        assert!(tracker.check("restart_service", "sonarr", 300, now));
    }

    #[test]
    fn no_prior_record_allows() {
        let tracker = CooldownTracker::new();
        assert!(tracker.check("restart_service", "jellyfin", 300, Utc::now()));
    }
}
