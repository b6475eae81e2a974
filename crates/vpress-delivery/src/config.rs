//! Delivery configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::directory::DirectoryDeliverySink;
use crate::error::{DeliveryError, DeliveryResult};
use crate::http::HttpDeliverySink;
use crate::sink::DeliverySink;

/// How artifacts reach the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Http,
    Directory,
}

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Transport
    pub mode: DeliveryMode,
    /// Consumer endpoint (HTTP mode)
    pub url: Option<String>,
    /// Drop directory (directory mode)
    pub drop_dir: PathBuf,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Shared key sent to the consumer
    pub service_key: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Http,
            url: None,
            drop_dir: PathBuf::from("delivered"),
            timeout: Duration::from_secs(60),
            service_key: None,
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mode = match std::env::var("DELIVERY_MODE") {
            Ok(v) if v.eq_ignore_ascii_case("directory") => DeliveryMode::Directory,
            _ => DeliveryMode::Http,
        };

        Self {
            mode,
            url: std::env::var("DELIVERY_URL")
                .or_else(|_| std::env::var("LMS_STORE_URL"))
                .ok(),
            drop_dir: std::env::var("DELIVERY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("delivered")),
            timeout: Duration::from_secs(
                std::env::var("DELIVERY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            service_key: std::env::var("INTERNAL_SERVICE_KEY").ok(),
        }
    }
}

/// Build the configured sink.
pub fn sink_from_config(config: &DeliveryConfig) -> DeliveryResult<Arc<dyn DeliverySink>> {
    match config.mode {
        DeliveryMode::Http => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| DeliveryError::config("DELIVERY_URL is required for HTTP delivery"))?;
            Ok(Arc::new(HttpDeliverySink::new(
                url,
                config.timeout,
                config.service_key.clone(),
            )?))
        }
        DeliveryMode::Directory => Ok(Arc::new(DirectoryDeliverySink::new(config.drop_dir.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_requires_url() {
        let err = sink_from_config(&DeliveryConfig::default()).err().expect("url missing");
        assert!(matches!(err, DeliveryError::Config(_)));
    }

    #[test]
    fn test_builds_sinks() {
        let http = sink_from_config(&DeliveryConfig {
            url: Some("http://lms.local/video/store".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(http.describe(), "http:http://lms.local/video/store");

        let dir = sink_from_config(&DeliveryConfig {
            mode: DeliveryMode::Directory,
            drop_dir: PathBuf::from("/srv/drop"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(dir.describe(), "dir:/srv/drop");
    }
}
