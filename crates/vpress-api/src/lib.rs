//! Axum HTTP API.
//!
//! This crate provides:
//! - Upload intake, status, confirmation and purge routes over the orchestrator
//! - Shared-key service authentication
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
