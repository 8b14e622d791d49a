//! Per-attribute counters
//!
//! - Counters only
//! - Monotonic increase
//! - Relaxed ordering, exact values are only needed once writers are idle

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    commits: AtomicU64,
    changes_applied: AtomicU64,
    changes_skipped: AtomicU64,
    divide_by_zero: AtomicU64,
    saves: AtomicU64,
    save_failures: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    generations_reclaimed: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_changes_applied(&self, n: u64) {
        self.changes_applied.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_changes_skipped(&self) {
        self.changes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_divide_by_zero(&self) {
        self.divide_by_zero.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_saves(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_save_failures(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_loads(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_load_failures(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_generations_reclaimed(&self, n: u64) {
        self.generations_reclaimed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn divide_by_zero(&self) -> u64 {
        self.divide_by_zero.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            changes_applied: self.changes_applied.load(Ordering::Relaxed),
            changes_skipped: self.changes_skipped.load(Ordering::Relaxed),
            divide_by_zero: self.divide_by_zero.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            generations_reclaimed: self.generations_reclaimed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub changes_applied: u64,
    pub changes_skipped: u64,
    pub divide_by_zero: u64,
    pub saves: u64,
    pub save_failures: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub generations_reclaimed: u64,
}
