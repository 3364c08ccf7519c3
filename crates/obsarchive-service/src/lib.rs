//! # obsarchive-service
//!
//! Archive lifecycle services. Each service is built from the catalog
//! contracts, the storage manager and the engine, all injected at
//! construction time via `Arc` references.
//!
//! - [`DeleteOrchestrator`]: discovery, validation, batched
//!   delete-and-record, then reconciliation
//! - [`ReconciliationReviewer`]: engine pipeline that marks observations
//!   deleted and requests actioned
//! - [`ValidationGate`]: fail-closed check against the metadata service
//! - [`StagePipeline`]: tape recall and copy into scratch space
//! - [`IncompleteUploadReviewer`]: removes incomplete multipart uploads
//!   whose completed object is verified

pub mod delete;
pub mod error;
pub mod incomplete;
pub mod review;
pub mod stage;
pub mod validation;

pub use delete::{DeleteOrchestrator, DeletePlan, DeleteRunSummary, DeletionTotals};
pub use error::DeleteRunError;
pub use incomplete::{IncompleteSummary, IncompleteUploadReviewer};
pub use review::{ReconciliationReviewer, ReviewSummary};
pub use stage::{StagePipeline, StageReport};
pub use validation::{
    ObservationValidator, StaticValidator, ValidationGate, WebServiceValidator,
};
