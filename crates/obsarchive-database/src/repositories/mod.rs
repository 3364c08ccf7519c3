//! PostgreSQL implementations of the catalog contracts.

pub mod delete;
pub mod observation;

pub use delete::DeleteRepository;
pub use observation::ObservationRepository;
