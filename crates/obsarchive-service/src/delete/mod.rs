//! Bulk deletion of approved delete requests.

pub mod orchestrator;
pub mod plan;

pub use orchestrator::{DeleteOrchestrator, DeleteRunSummary, DeletionTotals};
pub use plan::DeletePlan;
