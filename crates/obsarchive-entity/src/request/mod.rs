//! Delete request entities.

pub mod model;

pub use model::{DeleteRequest, FileScope};
