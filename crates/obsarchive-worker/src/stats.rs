//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters for one engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    to_process: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    interrupted: AtomicU64,
    drained_units: AtomicU64,
    drained_items: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Units ever enqueued.
    pub to_process: u64,
    /// Units a worker finished, whatever the result.
    pub attempted: u64,
    /// Units whose every stage succeeded.
    pub succeeded: u64,
    /// Units with a failed stage.
    pub failed: u64,
    /// Units stopped part-way by shutdown; finalize did not run.
    pub interrupted: u64,
    /// Units discarded from the outer queue at shutdown.
    pub drained_units: u64,
    /// Items discarded from inner queues at shutdown.
    pub drained_items: u64,
}

impl StatsSnapshot {
    /// Every enqueued unit is accounted for.
    pub fn is_balanced(&self, still_pending: u64) -> bool {
        self.attempted + self.drained_units + still_pending == self.to_process
    }
}

impl EngineStats {
    pub(crate) fn add_to_process(&self, n: u64) {
        self.to_process.fetch_add(n, Ordering::SeqCst);
    }

    pub(crate) fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_drained_units(&self, n: u64) {
        self.drained_units.fetch_add(n, Ordering::SeqCst);
    }

    pub(crate) fn record_drained_items(&self, n: u64) {
        self.drained_items.fetch_add(n, Ordering::SeqCst);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let interrupted = self.interrupted.load(Ordering::SeqCst);
        StatsSnapshot {
            to_process: self.to_process.load(Ordering::SeqCst),
            attempted: succeeded + failed + interrupted,
            succeeded,
            failed,
            interrupted,
            drained_units: self.drained_units.load(Ordering::SeqCst),
            drained_items: self.drained_items.load(Ordering::SeqCst),
        }
    }
}
