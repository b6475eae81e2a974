//! Orchestrator error types.

use thiserror::Error;

use vpress_models::{JobId, JobStatus, ModelError};
use vpress_store::StoreError;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors surfaced by orchestrator operations.
///
/// `CompressionFailure` and `DeliveryFailure` never reach a caller of
/// `submit`; the dispatcher records them on the job as `last_error`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {job_id} is not ready: status is {status}")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("Compression failed: {0}")]
    CompressionFailure(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Job store error: {0}")]
    Store(StoreError),
}

impl OrchestratorError {
    /// Stage label used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            OrchestratorError::CompressionFailure(_) => "compress",
            OrchestratorError::DeliveryFailure(_) => "deliver",
            OrchestratorError::StoreUnavailable(_) | OrchestratorError::Store(_) => "store",
            _ => "request",
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            OrchestratorError::StoreUnavailable(e.to_string())
        } else {
            OrchestratorError::Store(e)
        }
    }
}

impl From<ModelError> for OrchestratorError {
    fn from(e: ModelError) -> Self {
        OrchestratorError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_mapping() {
        let err: OrchestratorError = StoreError::unavailable("connection refused").into();
        assert!(matches!(err, OrchestratorError::StoreUnavailable(_)));

        let err: OrchestratorError = StoreError::Corrupt {
            key: "vpress:job:x".into(),
            message: "expected value".into(),
        }
        .into();
        assert!(matches!(err, OrchestratorError::Store(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_not_ready_message() {
        let err = OrchestratorError::NotReady {
            job_id: JobId::from("job-1"),
            status: JobStatus::Processing,
        };
        assert_eq!(err.to_string(), "Job job-1 is not ready: status is processing");
    }
}
