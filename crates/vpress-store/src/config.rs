//! Store configuration and boot-time backend selection.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::StoreResult;
use crate::memory::MemoryJobStore;
use crate::redis_store::RedisJobStore;
use crate::store::{JobStore, StoreKind};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to run on
    pub backend: StoreKind,
    /// Redis URL (Redis backend only)
    pub redis_url: String,
    /// Key namespace (Redis backend only)
    pub key_prefix: String,
    /// Record lifetime after its last write
    pub record_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vpress".to_string(),
            record_ttl: Duration::from_secs(86400), // 24 hours
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    ///
    /// `STORE_BACKEND=redis|memory` wins; otherwise `REDIS_ENABLED=true`
    /// selects Redis.
    pub fn from_env() -> Self {
        let backend = match std::env::var("STORE_BACKEND") {
            Ok(v) if v.eq_ignore_ascii_case("redis") => StoreKind::Redis,
            Ok(_) => StoreKind::Memory,
            Err(_) => {
                let redis_enabled = std::env::var("REDIS_ENABLED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false);
                if redis_enabled {
                    StoreKind::Redis
                } else {
                    StoreKind::Memory
                }
            }
        };

        Self {
            backend,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "vpress".to_string()),
            record_ttl: Duration::from_secs(
                std::env::var("JOB_RECORD_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86400),
            ),
        }
    }
}

/// Build the configured store.
///
/// A Redis backend that cannot be reached is an error; there is no
/// fallback to memory.
pub async fn connect_store(config: &StoreConfig) -> StoreResult<Arc<dyn JobStore>> {
    match config.backend {
        StoreKind::Memory => {
            info!("Using in-memory job store");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        StoreKind::Redis => {
            let store =
                RedisJobStore::connect(&config.redis_url, &config.key_prefix, config.record_ttl)
                    .await?;
            Ok(Arc::new(store))
        }
    }
}
