//! Job-scoped structured logging.

use tracing::{error, info, warn, Span};

use vpress_models::JobId;

/// Logs job lifecycle events with the job id and stage attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: String,
}

impl JobLogger {
    /// Create a logger for one job at one stage (e.g. "dispatch", "confirm").
    pub fn new(job_id: &JobId, stage: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same job, different stage.
    pub fn at_stage(&self, stage: &str) -> Self {
        Self {
            job_id: self.job_id.clone(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, stage = %self.stage, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, stage = %self.stage, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span carrying the job id and stage, for instrumenting a whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, stage = %self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_stages() {
        let logger = JobLogger::new(&JobId::from("job-1"), "dispatch");
        assert_eq!(logger.job_id(), "job-1");
        assert_eq!(logger.stage(), "dispatch");

        let compress = logger.at_stage("compress");
        assert_eq!(compress.job_id(), "job-1");
        assert_eq!(compress.stage(), "compress");
    }
}
