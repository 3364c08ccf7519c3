//! # obsarchive-entity
//!
//! Row models and enumerations for the metadata catalog. Structs that are
//! read straight from a query derive `sqlx::FromRow`; the integer-coded
//! catalog enums convert with `TryFrom<i32>`.

pub mod file;
pub mod observation;
pub mod request;
