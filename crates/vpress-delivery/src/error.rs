//! Delivery error types.

use std::path::PathBuf;

use thiserror::Error;

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Any non-acknowledged delivery attempt.
///
/// The dispatcher retries every variant the same way.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Consumer rejected delivery with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Delivery timed out")]
    Timeout,

    #[error("Artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeliveryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
