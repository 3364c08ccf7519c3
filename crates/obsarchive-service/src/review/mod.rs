//! Request-level reconciliation after a delete run.

pub mod reviewer;

pub use reviewer::{ReconciliationReviewer, ReviewSummary};
