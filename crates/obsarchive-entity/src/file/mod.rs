//! Archived data file entities.

pub mod filetype;
pub mod location;
pub mod model;

pub use filetype::FileType;
pub use location::StorageLocation;
pub use model::DataFile;
