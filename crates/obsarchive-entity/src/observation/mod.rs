//! Observation (`mwa_setting`) enumerations.

pub mod quality;

pub use quality::{DataQuality, ObservationMode};
