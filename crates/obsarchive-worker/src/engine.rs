//! Work queue engine — drives an [`ObservationPipeline`] with bounded
//! unit and item worker pools.
//!
//! Each unit worker repeatedly claims a unit from the outer queue, runs
//! prepare, fans the unit's items out to an inner queue served by up to M
//! item workers, waits for every item to be acknowledged, then runs
//! finalize. Workers stop pulling work once the cancellation token fires;
//! [`WorkQueueEngine::shutdown`] waits for them and drains what is left.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use obsarchive_core::config::EngineConfig;
use obsarchive_core::result::AppResult;

use crate::control::{EngineControl, EngineStatus, UnitStatus};
use crate::error::PipelineError;
use crate::pipeline::{FinalizePolicy, ItemOutcome, ObservationPipeline, UnitContext};
use crate::queue::WorkQueue;
use crate::scratch;
use crate::stats::{EngineStats, StatsSnapshot};

/// Pool bounds and scratch root for an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Concurrent unit workers (N).
    pub unit_workers: usize,
    /// Concurrent item workers per active unit (M).
    pub item_workers: usize,
    /// Root for per-unit scratch directories.
    pub working_path: Option<PathBuf>,
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            unit_workers: config.unit_workers.max(1),
            item_workers: config.item_workers.max(1),
            working_path: config.working_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitResult {
    Succeeded,
    Failed,
    Interrupted,
}

/// Shared state of one unit's item fan-out.
struct ItemBatch<P: ObservationPipeline> {
    unit: P::Unit,
    queue: Mutex<VecDeque<P::Item>>,
    ctx: UnitContext,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl<P: ObservationPipeline> ItemBatch<P> {
    fn pop(&self) -> Option<P::Item> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn drain(&self) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let n = queue.len();
        queue.clear();
        n
    }
}

struct EngineInner<P: ObservationPipeline> {
    pipeline: Arc<P>,
    settings: EngineSettings,
    queue: WorkQueue<P::Unit>,
    active: DashMap<P::Unit, UnitStatus>,
    stats: EngineStats,
    cancel: CancellationToken,
    workers: Mutex<TaskTracker>,
    shut_down: AtomicBool,
}

/// Two-level producer/consumer engine for one pipeline.
pub struct WorkQueueEngine<P: ObservationPipeline> {
    inner: Arc<EngineInner<P>>,
}

impl<P: ObservationPipeline> Clone for WorkQueueEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ObservationPipeline> std::fmt::Debug for WorkQueueEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueueEngine")
            .field("pipeline", &self.inner.pipeline.name())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl<P: ObservationPipeline> WorkQueueEngine<P> {
    /// Create an engine. `cancel` is the process-wide shutdown token.
    pub fn new(pipeline: Arc<P>, settings: EngineSettings, cancel: CancellationToken) -> Self {
        let settings = EngineSettings {
            unit_workers: settings.unit_workers.max(1),
            item_workers: settings.item_workers.max(1),
            ..settings
        };
        Self {
            inner: Arc::new(EngineInner {
                pipeline,
                settings,
                queue: WorkQueue::new(),
                active: DashMap::new(),
                stats: EngineStats::default(),
                cancel,
                workers: Mutex::new(TaskTracker::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// The pipeline being driven.
    pub fn pipeline(&self) -> &Arc<P> {
        &self.inner.pipeline
    }

    /// The shutdown token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Units still waiting in the outer queue.
    pub fn pending(&self) -> usize {
        self.inner.queue.pending_len()
    }

    /// Discover units and enqueue the new ones. Returns the number added.
    pub async fn populate(&self) -> AppResult<usize> {
        let units = self.inner.pipeline.discover().await?;
        let added = self.inner.queue.extend_new(units);
        self.inner.stats.add_to_process(added as u64);
        Ok(added)
    }

    /// Populate the queue and process it until it is empty or shutdown is
    /// requested. Returns the counters at the end of the run.
    pub async fn run(&self) -> AppResult<StatsSnapshot> {
        if let Some(root) = &self.inner.settings.working_path {
            scratch::reset_working_root(root).await?;
        }

        let added = self.populate().await?;
        tracing::info!(
            "{}: {} units to process, {} unit workers, {} item workers each",
            self.inner.pipeline.name(),
            added,
            self.inner.settings.unit_workers,
            self.inner.settings.item_workers
        );

        let tracker = TaskTracker::new();
        *self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = tracker.clone();

        for worker in 0..self.inner.settings.unit_workers {
            let inner = Arc::clone(&self.inner);
            tracker.spawn(async move { inner.unit_worker(worker).await });
        }
        tracker.close();
        tracker.wait().await;

        tracing::debug!("{}: all unit workers finished", self.inner.pipeline.name());
        Ok(self.stats())
    }

    /// Stop the engine: cancel, wait for every worker to exit, drain the
    /// outer queue, close the pipeline's pools and log the summary.
    /// Calling it again only returns the counters.
    pub async fn shutdown(&self) -> StatsSnapshot {
        self.inner.cancel.cancel();
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return self.stats();
        }

        let name = self.inner.pipeline.name().to_string();
        tracing::info!("Stopping {}...", name);

        let tracker = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if !tracker.is_empty() {
            tracing::debug!("Waiting for {} workers to complete...", tracker.len());
        }
        tracker.close();
        tracker.wait().await;

        let drained = self.inner.queue.drain_pending();
        if !drained.is_empty() {
            tracing::info!("Cleared {} unprocessed units from the queue", drained.len());
            self.inner.stats.record_drained_units(drained.len() as u64);
        }

        tracing::debug!("Closing database pools");
        self.inner.pipeline.close().await;

        let s = self.stats();
        tracing::info!("Total Observations to process      : {}", s.to_process);
        tracing::info!("Observations attempted             : {}", s.attempted);
        tracing::info!("Observations processed successfully: {}", s.succeeded);
        tracing::info!("Observations failed with errors    : {}", s.failed);
        tracing::info!("Observations interrupted           : {}", s.interrupted);
        tracing::info!("Observations drained unprocessed   : {}", s.drained_units);
        s
    }
}

impl<P: ObservationPipeline> EngineInner<P> {
    async fn unit_worker(self: Arc<Self>, worker: usize) {
        let name = self.pipeline.name();
        tracing::debug!("{} worker {} started", name, worker);

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("{} worker {} saw shutdown", name, worker);
                break;
            }
            let Some(unit) = self.queue.claim_next() else {
                tracing::debug!("{} worker {}: queue empty", name, worker);
                break;
            };

            self.active.insert(
                unit.clone(),
                UnitStatus {
                    unit: unit.to_string(),
                    ..UnitStatus::default()
                },
            );
            tracing::info!(unit = %unit, "Started");

            let result = self.process_unit(&unit).await;
            match result {
                UnitResult::Succeeded => self.stats.record_succeeded(),
                UnitResult::Failed => self.stats.record_failed(),
                UnitResult::Interrupted => self.stats.record_interrupted(),
            }

            self.active.remove(&unit);
            self.queue.release(&unit);
            tracing::info!(unit = %unit, outcome = ?result, "Complete");
        }
    }

    async fn process_unit(self: &Arc<Self>, unit: &P::Unit) -> UnitResult {
        let working_dir = match (&self.settings.working_path, self.pipeline.uses_working_dir()) {
            (Some(root), true) => match scratch::create_unit_dir(root, unit).await {
                Ok(dir) => Some(dir),
                Err(e) => {
                    tracing::error!(unit = %unit, "Cannot create working directory: {}", e);
                    return UnitResult::Failed;
                }
            },
            _ => None,
        };

        let ctx = UnitContext {
            working_dir: working_dir.clone(),
            cancel: self.cancel.clone(),
        };

        let result = match AssertUnwindSafe(self.run_stages(unit, ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(unit = %unit, "Pipeline panicked");
                UnitResult::Failed
            }
        };

        if let Some(dir) = working_dir {
            if let Err(e) = scratch::remove_unit_dir(&dir).await {
                tracing::warn!(unit = %unit, "Cannot remove working directory: {}", e);
            }
        }
        result
    }

    async fn run_stages(self: &Arc<Self>, unit: &P::Unit, ctx: UnitContext) -> UnitResult {
        if let Err(e) = self.pipeline.prepare(unit, &ctx).await {
            return stage_failed(unit, PipelineError::Prepare(e));
        }

        let (outcome, ctx) = match self.pipeline.list_items(unit, &ctx).await {
            Ok(Some(items)) => self.process_items(unit, items, ctx).await,
            Ok(None) => (ItemOutcome::default(), ctx),
            Err(e) => return stage_failed(unit, PipelineError::ListItems(e)),
        };

        let all_ok = outcome.all_succeeded();
        if !all_ok && self.cancel.is_cancelled() {
            tracing::warn!(
                unit = %unit,
                "Interrupted after {}/{} items; {} drained",
                outcome.succeeded + outcome.failed,
                outcome.total,
                outcome.drained
            );
            return UnitResult::Interrupted;
        }
        if !all_ok && self.pipeline.finalize_policy() == FinalizePolicy::OnlyIfAllSucceeded {
            tracing::warn!(
                unit = %unit,
                "{} of {} items failed; not finalizing",
                outcome.failed,
                outcome.total
            );
            return UnitResult::Failed;
        }

        match self.pipeline.finalize(unit, &outcome, &ctx).await {
            Ok(()) if all_ok => UnitResult::Succeeded,
            Ok(()) => UnitResult::Failed,
            Err(e) => stage_failed(unit, PipelineError::Finalize(e)),
        }
    }

    /// Fan items out to the item pool and wait until each one has been
    /// acknowledged or drained.
    async fn process_items(
        self: &Arc<Self>,
        unit: &P::Unit,
        items: Vec<P::Item>,
        ctx: UnitContext,
    ) -> (ItemOutcome, UnitContext) {
        let total = items.len();
        if let Some(mut status) = self.active.get_mut(unit) {
            status.items_total = total;
        }
        if total == 0 {
            return (ItemOutcome::default(), ctx);
        }

        let batch = Arc::new(ItemBatch::<P> {
            unit: unit.clone(),
            queue: Mutex::new(VecDeque::from(items)),
            ctx,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });

        let mut workers = JoinSet::new();
        for _ in 0..self.settings.item_workers.min(total) {
            let inner = Arc::clone(self);
            let batch = Arc::clone(&batch);
            workers.spawn(async move { inner.item_worker(batch).await });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(unit = %unit, "Item worker aborted: {}", e);
            }
        }

        let drained = batch.drain();
        if drained > 0 {
            self.stats.record_drained_items(drained as u64);
        }
        let succeeded = batch.succeeded.load(Ordering::SeqCst);
        let failed = total
            .saturating_sub(succeeded)
            .saturating_sub(drained)
            .max(batch.failed.load(Ordering::SeqCst));

        let outcome = ItemOutcome {
            total,
            succeeded,
            failed,
            drained,
        };
        (outcome, batch.ctx.clone())
    }

    async fn item_worker(self: Arc<Self>, batch: Arc<ItemBatch<P>>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(item) = batch.pop() else {
                break;
            };

            let label = item.to_string();
            if let Some(mut status) = self.active.get_mut(&batch.unit) {
                status.in_progress.push(label.clone());
            }

            let result = AssertUnwindSafe(self.pipeline.process_item(&batch.unit, &item, &batch.ctx))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(())) => {
                    batch.succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Err(e)) => {
                    tracing::error!(unit = %batch.unit, item = %label, "Item failed: {}", e);
                    batch.failed.fetch_add(1, Ordering::SeqCst);
                }
                Err(_) => {
                    tracing::error!(unit = %batch.unit, item = %label, "Item handler panicked");
                    batch.failed.fetch_add(1, Ordering::SeqCst);
                }
            }

            if let Some(mut status) = self.active.get_mut(&batch.unit) {
                status.items_done += 1;
                status.in_progress.retain(|i| i != &label);
            }
        }
    }
}

fn stage_failed<U: std::fmt::Display>(unit: &U, err: PipelineError) -> UnitResult {
    if err.is_cancelled() {
        tracing::info!(unit = %unit, stage = err.stage(), "Stopped by shutdown");
        UnitResult::Interrupted
    } else {
        tracing::error!(unit = %unit, stage = err.stage(), "{}", err);
        UnitResult::Failed
    }
}

#[async_trait]
impl<P: ObservationPipeline> EngineControl for WorkQueueEngine<P> {
    fn status(&self) -> EngineStatus {
        let mut processing: Vec<UnitStatus> = self
            .inner
            .active
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        processing.sort_by(|a, b| a.unit.cmp(&b.unit));

        EngineStatus {
            pipeline: self.inner.pipeline.name().to_string(),
            unit_workers: self.inner.settings.unit_workers,
            item_workers: self.inner.settings.item_workers,
            queued: self.inner.queue.pending_len(),
            processing,
            stopping: self.inner.cancel.is_cancelled(),
            stats: self.stats(),
        }
    }

    async fn refresh(&self) -> AppResult<usize> {
        if self.inner.cancel.is_cancelled() {
            return Ok(0);
        }
        tracing::info!("Refreshing observation list...");
        let added = self.populate().await?;
        tracing::info!(
            "Refreshing observation list complete. {} new observations.",
            added
        );
        Ok(added)
    }

    fn stop(&self) {
        tracing::info!("Stop requested");
        self.inner.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsarchive_core::error::AppError;
    use std::collections::HashSet;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct TestPipeline {
        units: Mutex<Vec<u64>>,
        items_per_unit: usize,
        policy: Option<FinalizePolicy>,
        use_dir: bool,
        fail_prepare: HashSet<u64>,
        fail_items: HashSet<(u64, usize)>,
        panic_items: HashSet<(u64, usize)>,
        cancel_on: Option<((u64, usize), CancellationToken)>,
        hold_prepare: Option<(u64, Arc<Notify>, Arc<Notify>)>,
        processed: Mutex<Vec<(u64, usize)>>,
        finalized: Mutex<Vec<u64>>,
        dirs: Mutex<Vec<PathBuf>>,
    }

    impl TestPipeline {
        fn with_units(units: Vec<u64>, items_per_unit: usize) -> Self {
            Self {
                units: Mutex::new(units),
                items_per_unit,
                ..Self::default()
            }
        }

        fn finalized(&self) -> Vec<u64> {
            let mut v = self.finalized.lock().unwrap().clone();
            v.sort();
            v
        }
    }

    #[async_trait]
    impl ObservationPipeline for TestPipeline {
        type Unit = u64;
        type Item = usize;

        fn name(&self) -> &str {
            "test"
        }

        fn finalize_policy(&self) -> FinalizePolicy {
            self.policy.unwrap_or(FinalizePolicy::Always)
        }

        fn uses_working_dir(&self) -> bool {
            self.use_dir
        }

        async fn discover(&self) -> AppResult<Vec<u64>> {
            Ok(self.units.lock().unwrap().clone())
        }

        async fn prepare(&self, unit: &u64, ctx: &UnitContext) -> AppResult<()> {
            if let Some(dir) = &ctx.working_dir {
                assert!(dir.exists());
                self.dirs.lock().unwrap().push(dir.clone());
            }
            if let Some((held, entered, release)) = &self.hold_prepare {
                if held == unit {
                    entered.notify_one();
                    release.notified().await;
                }
            }
            if self.fail_prepare.contains(unit) {
                return Err(AppError::staging("staging failed"));
            }
            Ok(())
        }

        async fn list_items(&self, _unit: &u64, _ctx: &UnitContext) -> AppResult<Option<Vec<usize>>> {
            if self.items_per_unit == 0 {
                Ok(None)
            } else {
                Ok(Some((0..self.items_per_unit).collect()))
            }
        }

        async fn process_item(&self, unit: &u64, item: &usize, _ctx: &UnitContext) -> AppResult<()> {
            self.processed.lock().unwrap().push((*unit, *item));
            if let Some((at, token)) = &self.cancel_on {
                if *at == (*unit, *item) {
                    token.cancel();
                }
            }
            if self.panic_items.contains(&(*unit, *item)) {
                panic!("boom");
            }
            if self.fail_items.contains(&(*unit, *item)) {
                return Err(AppError::storage("item failed"));
            }
            Ok(())
        }

        async fn finalize(&self, unit: &u64, _items: &ItemOutcome, _ctx: &UnitContext) -> AppResult<()> {
            self.finalized.lock().unwrap().push(*unit);
            Ok(())
        }
    }

    fn settings(n: usize, m: usize) -> EngineSettings {
        EngineSettings {
            unit_workers: n,
            item_workers: m,
            working_path: None,
        }
    }

    #[tokio::test]
    async fn processes_every_unit_and_item() {
        let pipeline = Arc::new(TestPipeline::with_units(vec![1, 2, 3, 4], 5));
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(2, 3), CancellationToken::new());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.to_process, 4);
        assert_eq!(stats.succeeded, 4);
        assert_eq!(stats.failed, 0);
        assert_eq!(pipeline.processed.lock().unwrap().len(), 20);
        assert_eq!(pipeline.finalized(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failed_item_blocks_conditional_finalize() {
        let mut p = TestPipeline::with_units(vec![1, 2], 3);
        p.policy = Some(FinalizePolicy::OnlyIfAllSucceeded);
        p.fail_items.insert((1, 2));
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 2), CancellationToken::new());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(pipeline.finalized(), vec![2]);
    }

    #[tokio::test]
    async fn failed_item_still_finalizes_under_always_policy() {
        let mut p = TestPipeline::with_units(vec![1], 3);
        p.fail_items.insert((1, 0));
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), CancellationToken::new());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(pipeline.finalized(), vec![1]);
    }

    #[tokio::test]
    async fn prepare_error_does_not_stop_the_worker() {
        let mut p = TestPipeline::with_units(vec![1, 2, 3], 0);
        p.fail_prepare.insert(2);
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), CancellationToken::new());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(pipeline.finalized(), vec![1, 3]);
    }

    #[tokio::test]
    async fn panicking_item_counts_as_failure() {
        let mut p = TestPipeline::with_units(vec![1, 2], 2);
        p.panic_items.insert((1, 1));
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), CancellationToken::new());

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(pipeline.processed.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn shutdown_drains_without_losing_work() {
        let token = CancellationToken::new();
        let mut p = TestPipeline::with_units(vec![1, 2, 3, 4, 5], 3);
        p.cancel_on = Some(((2, 0), token.clone()));
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), token);

        engine.run().await.unwrap();
        let stats = engine.shutdown().await;

        assert_eq!(stats.to_process, 5);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.interrupted, 1);
        assert_eq!(stats.drained_units, 3);
        assert_eq!(stats.drained_items, 2);
        assert!(stats.is_balanced(engine.pending() as u64));
        assert_eq!(pipeline.finalized(), vec![1]);

        // idempotent
        assert_eq!(engine.shutdown().await, stats);
    }

    #[tokio::test]
    async fn refresh_skips_claimed_and_queued_units() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut p = TestPipeline::with_units(vec![1, 2], 0);
        p.hold_prepare = Some((1, entered.clone(), release.clone()));
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), CancellationToken::new());

        let runner = engine.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        entered.notified().await;
        let status = engine.status();
        assert_eq!(status.processing.len(), 1);
        assert_eq!(status.processing[0].unit, "1");
        assert_eq!(status.queued, 1);
        assert!(status.summary_line().starts_with("Running 1 tasks. Observations remaining: 1/2"));

        pipeline.units.lock().unwrap().push(3);
        assert_eq!(engine.refresh().await.unwrap(), 1);

        release.notify_one();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.to_process, 3);
        assert_eq!(stats.succeeded, 3);
    }

    #[tokio::test]
    async fn working_directories_are_created_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let mut p = TestPipeline::with_units(vec![7, 8], 1);
        p.use_dir = true;
        let pipeline = Arc::new(p);
        let engine = WorkQueueEngine::new(
            pipeline.clone(),
            EngineSettings {
                unit_workers: 2,
                item_workers: 1,
                working_path: Some(root.path().join("work")),
            },
            CancellationToken::new(),
        );

        engine.run().await.unwrap();
        let dirs = pipeline.dirs.lock().unwrap().clone();
        assert_eq!(dirs.len(), 2);
        assert!(dirs.iter().all(|d| !d.exists()));
        assert!(root.path().join("work").exists());
    }

    #[tokio::test]
    async fn stop_via_control_prevents_new_work() {
        let pipeline = Arc::new(TestPipeline::with_units(vec![1, 2], 0));
        let engine = WorkQueueEngine::new(pipeline.clone(), settings(1, 1), CancellationToken::new());
        engine.stop();

        let stats = engine.run().await.unwrap();
        assert_eq!(stats.attempted, 0);
        let stats = engine.shutdown().await;
        assert_eq!(stats.drained_units, 2);
        assert_eq!(engine.refresh().await.unwrap(), 0);
    }
}
