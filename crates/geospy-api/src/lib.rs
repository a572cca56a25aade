//! GeoSpy Cache admin API
//!
//! This crate provides the Axum-based HTTP API used to inspect and maintain
//! the in-process caches: statistics, clearing and on-demand sweeps.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
