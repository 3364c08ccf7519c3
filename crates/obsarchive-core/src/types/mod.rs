//! Shared value types.

pub mod chunk;
pub mod gps;
pub mod id;

pub use chunk::{Batches, batches};
pub use id::{DeleteRequestId, ObsId};
