use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::info;

use crate::error::ErrorKind;

/// Outcome counters for lifecycle operations
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub transitions: AtomicU64,
    pub claim_conflicts: AtomicU64,
    pub follow_up_failures: AtomicU64,
    pub notifications_sent: AtomicU64,
    failures: Mutex<BTreeMap<ErrorKind, u64>>,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claim_conflict(&self) {
        self.claim_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_follow_up_failure(&self) {
        self.follow_up_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notifications(&self, count: usize) {
        self.notifications_sent
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        if let Ok(mut failures) = self.failures.lock() {
            *failures.entry(kind).or_default() += 1;
        }
    }

    pub fn get_stats(&self) -> LifecycleStats {
        LifecycleStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            claim_conflicts: self.claim_conflicts.load(Ordering::Relaxed),
            follow_up_failures: self.follow_up_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            failures: self
                .failures
                .lock()
                .map(|failures| failures.clone())
                .unwrap_or_default(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            claim_conflicts = stats.claim_conflicts,
            follow_up_failures = stats.follow_up_failures,
            notifications_sent = stats.notifications_sent,
            "Lifecycle metrics"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleStats {
    pub transitions: u64,
    pub claim_conflicts: u64,
    pub follow_up_failures: u64,
    pub notifications_sent: u64,
    pub failures: BTreeMap<ErrorKind, u64>,
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
