//! Job record storage.
//!
//! This crate provides:
//! - The [`JobStore`] trait shared by every component that touches records
//! - A durable Redis backend with per-record expiration
//! - An in-process backend for single-instance deployments and tests
//! - Boot-time backend selection from configuration

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::{connect_store, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;
pub use store::{JobStore, StoreKind};
