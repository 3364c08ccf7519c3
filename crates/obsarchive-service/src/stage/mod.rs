//! Tape recall pipeline.

pub mod pipeline;

pub use pipeline::{StagePipeline, StageReport};
