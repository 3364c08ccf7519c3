//! Object store implementations.

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use memory::MemoryObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
