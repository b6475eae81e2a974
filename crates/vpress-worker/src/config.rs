//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::reaper::ReaperConfig;
use crate::retry::RetryPolicy;

/// Orchestrator, dispatcher and reaper configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Where raw uploads are written
    pub upload_dir: PathBuf,
    /// Where compressed artifacts are written
    pub output_dir: PathBuf,
    /// Dispatcher runs allowed at once
    pub max_concurrent_jobs: usize,
    /// Delivery attempts per job, including the first
    pub delivery_max_attempts: u32,
    /// Wait before the second delivery attempt
    pub delivery_initial_backoff: Duration,
    /// Time between reap passes
    pub reaper_interval: Duration,
    /// Age after which an unreferenced file is an orphan
    pub file_retention: Duration,
    /// How long a delivered job may wait for its confirmation
    pub confirmation_grace: Duration,
    /// Record lifetime, enforced by the reaper on stores without native TTL
    pub record_ttl: Duration,
    /// Trigger a reap pass on every submit
    pub reap_on_intake: bool,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_concurrent_jobs: 2,
            delivery_max_attempts: 3,
            delivery_initial_backoff: Duration::from_millis(2000),
            reaper_interval: Duration::from_secs(300),
            file_retention: Duration::from_secs(86400), // 24 hours
            confirmation_grace: Duration::from_secs(6 * 3600),
            record_ttl: Duration::from_secs(86400),
            reap_on_intake: false,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("COMPRESS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS").unwrap_or(defaults.max_concurrent_jobs),
            delivery_max_attempts: env_parse("DELIVERY_MAX_ATTEMPTS")
                .unwrap_or(defaults.delivery_max_attempts),
            delivery_initial_backoff: env_parse("DELIVERY_INITIAL_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.delivery_initial_backoff),
            reaper_interval: env_parse("REAPER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            file_retention: env_parse("FILE_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.file_retention),
            confirmation_grace: env_parse("CONFIRMATION_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_grace),
            record_ttl: env_parse("JOB_RECORD_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.record_ttl),
            reap_on_intake: std::env::var("REAP_ON_INTAKE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.reap_on_intake),
            shutdown_timeout: env_parse("SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
    }

    /// Delivery retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.delivery_max_attempts, self.delivery_initial_backoff)
    }

    /// Reaper settings; sweeps the upload and output directories.
    pub fn reaper_config(&self) -> ReaperConfig {
        ReaperConfig {
            scan_dirs: vec![self.upload_dir.clone(), self.output_dir.clone()],
            interval: self.reaper_interval,
            file_retention: self.file_retention,
            confirmation_grace: self.confirmation_grace,
            record_ttl: self.record_ttl,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.delivery_max_attempts, 3);
        assert_eq!(config.delivery_initial_backoff, Duration::from_secs(2));
        assert_eq!(config.reaper_interval, Duration::from_secs(300));
        assert_eq!(config.confirmation_grace, Duration::from_secs(21600));

        let policy = config.retry_policy();
        assert_eq!(policy.backoff_after(2), Duration::from_secs(4));

        let reaper = config.reaper_config();
        assert_eq!(reaper.scan_dirs, vec![PathBuf::from("uploads"), PathBuf::from("outputs")]);
    }
}
