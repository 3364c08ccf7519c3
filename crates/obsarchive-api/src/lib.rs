//! # obsarchive-api
//!
//! HTTP status surface for a running processor, built on Axum.
//!
//! - `GET /status`: worker bounds, queue depth, claimed units, counters
//! - `GET /refresh_obs_list`: re-run discovery and enqueue new units
//! - `GET /stop`: request a graceful shutdown

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::serve;
pub use state::ApiState;
