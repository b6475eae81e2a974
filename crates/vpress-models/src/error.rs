//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while validating input at the service boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),
}

impl ModelError {
    pub fn invalid_job_id(msg: impl Into<String>) -> Self {
        Self::InvalidJobId(msg.into())
    }

    pub fn unsupported_file_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedFileType(msg.into())
    }
}
