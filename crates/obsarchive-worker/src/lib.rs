//! Observation processing engine.
//!
//! This crate provides:
//! - The [`ObservationPipeline`] trait: discover, prepare, list items,
//!   process one item, finalize
//! - The [`WorkQueueEngine`] that drives a pipeline with bounded pools of
//!   unit workers and item workers
//! - Per-unit scratch directories
//! - Status reporting and the control surface used by the status endpoints
//! - Wiring from OS interrupt signals to the shared cancellation token

pub mod control;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod scratch;
pub mod signal;
pub mod stats;

pub use control::{EngineControl, EngineStatus, UnitStatus};
pub use engine::{EngineSettings, WorkQueueEngine};
pub use error::PipelineError;
pub use pipeline::{FinalizePolicy, ItemOutcome, ObservationPipeline, UnitContext};
pub use stats::{EngineStats, StatsSnapshot};
