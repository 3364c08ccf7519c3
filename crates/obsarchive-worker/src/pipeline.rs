//! Pipeline stages driven by the engine.

use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use obsarchive_core::result::AppResult;

/// Whether `finalize` runs after item processing regardless of item
/// failures, or only when every item succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    /// Finalize runs whenever the join barrier is reached.
    Always,
    /// Finalize runs only if no item failed.
    OnlyIfAllSucceeded,
}

/// Per-unit context handed to every stage.
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Scratch directory for this unit, when the pipeline asked for one and
    /// a working path is configured. Removed after the unit completes.
    pub working_dir: Option<PathBuf>,
    /// Shared shutdown token. Long stages should check it.
    pub cancel: CancellationToken,
}

/// Item tallies for one unit, taken at the join barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ItemOutcome {
    /// Items listed for the unit.
    pub total: usize,
    /// Items whose handler returned `Ok`.
    pub succeeded: usize,
    /// Items whose handler returned an error or panicked.
    pub failed: usize,
    /// Items discarded unprocessed because shutdown was requested.
    pub drained: usize,
}

impl ItemOutcome {
    /// Every listed item was processed successfully.
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

/// A multi-stage pipeline over units of work (usually observations).
///
/// For every unit the engine runs `prepare`, then `list_items`; when that
/// yields items they are processed by the item pool and, after all of them
/// have been acknowledged, `finalize` runs according to
/// [`ObservationPipeline::finalize_policy`].
#[async_trait]
pub trait ObservationPipeline: Send + Sync + 'static {
    /// Unit identifier.
    type Unit: Clone + Eq + Hash + Ord + fmt::Display + fmt::Debug + Send + Sync + 'static;
    /// Sub-item of a unit.
    type Item: fmt::Display + Send + Sync + 'static;

    /// Pipeline name used in logs and status.
    fn name(&self) -> &str;

    /// When `finalize` runs.
    fn finalize_policy(&self) -> FinalizePolicy {
        FinalizePolicy::Always
    }

    /// Whether each unit gets a scratch directory.
    fn uses_working_dir(&self) -> bool {
        false
    }

    /// Produce the units to process. Also used by refresh.
    async fn discover(&self) -> AppResult<Vec<Self::Unit>>;

    /// Unit-level work before items are listed.
    async fn prepare(&self, _unit: &Self::Unit, _ctx: &UnitContext) -> AppResult<()> {
        Ok(())
    }

    /// Items of the unit, or `None` when the pipeline has no per-item stage.
    async fn list_items(
        &self,
        _unit: &Self::Unit,
        _ctx: &UnitContext,
    ) -> AppResult<Option<Vec<Self::Item>>> {
        Ok(None)
    }

    /// Process one item. Items of a unit run concurrently, in any order.
    async fn process_item(
        &self,
        _unit: &Self::Unit,
        _item: &Self::Item,
        _ctx: &UnitContext,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Unit-level work after the join barrier.
    async fn finalize(
        &self,
        _unit: &Self::Unit,
        _items: &ItemOutcome,
        _ctx: &UnitContext,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Release pooled resources once every worker has stopped.
    async fn close(&self) {}
}
