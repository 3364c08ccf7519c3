//! Status and control surface exposed to the status endpoints.

use async_trait::async_trait;
use serde::Serialize;

use obsarchive_core::result::AppResult;

use crate::stats::StatsSnapshot;

/// Progress of one claimed unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    /// Unit id.
    pub unit: String,
    /// Items listed for the unit so far.
    pub items_total: usize,
    /// Items acknowledged so far.
    pub items_done: usize,
    /// Items currently being processed.
    pub in_progress: Vec<String>,
}

/// Snapshot of an engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Pipeline name.
    pub pipeline: String,
    /// Unit worker bound.
    pub unit_workers: usize,
    /// Item worker bound per unit.
    pub item_workers: usize,
    /// Units waiting in the outer queue.
    pub queued: usize,
    /// Claimed units.
    pub processing: Vec<UnitStatus>,
    /// Shutdown has been requested.
    pub stopping: bool,
    /// Counters.
    pub stats: StatsSnapshot,
}

impl EngineStatus {
    /// One-line human-readable summary.
    pub fn summary_line(&self) -> String {
        let units: Vec<&str> = self.processing.iter().map(|u| u.unit.as_str()).collect();
        format!(
            "Running {} tasks. Observations remaining: {}/{} Processing: [{}]",
            self.unit_workers,
            self.queued,
            self.stats.to_process,
            units.join(", ")
        )
    }
}

/// Object-safe handle on a running engine.
#[async_trait]
pub trait EngineControl: Send + Sync + 'static {
    /// Current status.
    fn status(&self) -> EngineStatus;

    /// Re-run discovery and enqueue units that are neither queued nor
    /// claimed. Returns the number added.
    async fn refresh(&self) -> AppResult<usize>;

    /// Request shutdown.
    fn stop(&self);
}
