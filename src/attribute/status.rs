//! Column statistics and their recompute throttle.

use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub num_docs: u64,
    pub num_values: u64,
    pub num_unique_values: u64,
    /// Largest value count of any document
    pub highest_value_count: u32,
    pub updates: u64,
    pub non_idempotent_updates: u64,
    pub last_sync_token: u64,
    pub allocated_bytes: u64,
    pub on_hold_bytes: u64,
}

impl Status {
    pub fn inc_updates(&mut self, n: u64) {
        self.updates += n;
    }

    pub fn inc_non_idempotent_updates(&mut self, n: u64) {
        self.non_idempotent_updates += n;
    }
}

/// Decides when a full recomputation is due.
#[derive(Debug)]
pub(crate) struct StatThrottle {
    interval: Duration,
    change_threshold: u64,
    next_update: Option<Instant>,
    changes_since_update: u64,
}

impl StatThrottle {
    pub fn new(interval_ms: u64, change_threshold: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            change_threshold,
            next_update: None,
            changes_since_update: 0,
        }
    }

    pub fn record_changes(&mut self, n: u64) {
        self.changes_since_update += n;
    }

    pub fn is_due(&self, force: bool, now: Instant) -> bool {
        force
            || self.next_update.map_or(true, |next| now >= next)
            || self.changes_since_update >= self.change_threshold
    }

    pub fn mark_updated(&mut self, now: Instant) {
        self.next_update = Some(now + self.interval);
        self.changes_since_update = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_always_due() {
        let throttle = StatThrottle::new(60_000, 10);
        assert!(throttle.is_due(false, Instant::now()));
    }

    #[test]
    fn test_interval_throttles() {
        let mut throttle = StatThrottle::new(60_000, 10);
        let now = Instant::now();
        throttle.mark_updated(now);
        assert!(!throttle.is_due(false, now));
        assert!(throttle.is_due(true, now));
        assert!(throttle.is_due(false, now + Duration::from_secs(61)));
    }

    #[test]
    fn test_change_volume_forces_update() {
        let mut throttle = StatThrottle::new(60_000, 10);
        let now = Instant::now();
        throttle.mark_updated(now);
        throttle.record_changes(9);
        assert!(!throttle.is_due(false, now));
        throttle.record_changes(1);
        assert!(throttle.is_due(false, now));
        throttle.mark_updated(now);
        assert!(!throttle.is_due(false, now));
    }
}
