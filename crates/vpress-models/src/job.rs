//! Job record and related types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// Caller-supplied job identifier.
///
/// The service never generates these; the submitter picks them and
/// uses them again to query and confirm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque caller fields, passed through to the delivery sink untouched.
pub type JobMetadata = BTreeMap<String, String>;

/// A tracked compression-and-delivery job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Raw upload
    pub input_path: PathBuf,
    /// Compressed artifact, set on entering `awaiting_confirmation`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: JobMetadata,
    /// Human-readable diagnostic, only present in `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl JobRecord {
    /// Create a freshly queued record.
    pub fn queued(
        job_id: JobId,
        input_path: impl Into<PathBuf>,
        metadata: JobMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            input_path: input_path.into(),
            output_path: None,
            created_at: now,
            updated_at: now,
            metadata,
            last_error: None,
        }
    }

    /// Merge a status change and its extra fields into the record.
    pub fn apply(&mut self, status: JobStatus, update: StatusUpdate, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
        if let Some(output_path) = update.output_path {
            self.output_path = Some(output_path);
        }
        if status == JobStatus::Failed {
            if let Some(error) = update.last_error {
                self.last_error = Some(error);
            }
        } else {
            self.last_error = None;
        }
    }

    /// Every local file this record owns.
    pub fn local_files(&self) -> Vec<&Path> {
        let mut files = vec![self.input_path.as_path()];
        if let Some(output) = self.output_path.as_deref() {
            files.push(output);
        }
        files
    }

    /// Age of the record relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Time since the last write, which for a settled record is how long it
    /// has held its current status.
    pub fn time_in_status(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }
}

/// Extra fields merged alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub output_path: Option<PathBuf>,
    pub last_error: Option<String>,
}

impl StatusUpdate {
    /// No extra fields.
    pub fn none() -> Self {
        Self::default()
    }

    /// Record the compressed artifact.
    pub fn with_output(path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Record a failure diagnostic.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            last_error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Status reported to callers polling a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: JobId,
    /// A [`JobStatus`] string, or `not_found`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
}

impl StatusReport {
    pub const NOT_FOUND: &'static str = "not_found";

    pub fn not_found(job_id: JobId) -> Self {
        Self {
            job_id,
            status: Self::NOT_FOUND.to_string(),
            last_error: None,
            metadata: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Self::NOT_FOUND
    }
}

impl From<&JobRecord> for StatusReport {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status.as_str().to_string(),
            last_error: record.last_error.clone(),
            metadata: Some(record.metadata.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        let mut metadata = JobMetadata::new();
        metadata.insert("organization_id".into(), "acme".into());
        JobRecord::queued(JobId::from("job-1"), "/tmp/in.mp4", metadata, Utc::now())
    }

    #[test]
    fn test_queued_record() {
        let record = record();
        assert_eq!(record.status, JobStatus::Queued);
        assert!(record.output_path.is_none());
        assert!(record.last_error.is_none());
        assert_eq!(record.local_files(), vec![Path::new("/tmp/in.mp4")]);
    }

    #[test]
    fn test_apply_merges_extra_fields() {
        let mut record = record();
        record.apply(JobStatus::Processing, StatusUpdate::none(), Utc::now());
        record.apply(
            JobStatus::AwaitingConfirmation,
            StatusUpdate::with_output("/tmp/out.mp4"),
            Utc::now(),
        );

        assert_eq!(record.status, JobStatus::AwaitingConfirmation);
        assert_eq!(record.output_path.as_deref(), Some(Path::new("/tmp/out.mp4")));
        assert_eq!(record.local_files().len(), 2);
        assert_eq!(record.metadata.get("organization_id").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_last_error_only_in_failed() {
        let mut record = record();
        record.apply(JobStatus::Processing, StatusUpdate::with_error("ignored"), Utc::now());
        assert!(record.last_error.is_none());

        record.apply(JobStatus::Failed, StatusUpdate::with_error("ffmpeg exited 1"), Utc::now());
        assert_eq!(record.last_error.as_deref(), Some("ffmpeg exited 1"));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = record();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["job_id"], "job-1");
        assert_eq!(value["status"], "queued");
        assert!(value.get("output_path").is_none());

        let back: JobRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_status_report() {
        let report = StatusReport::from(&record());
        assert_eq!(report.status, "queued");
        assert!(!report.is_not_found());

        let missing = StatusReport::not_found(JobId::from("nope"));
        assert!(missing.is_not_found());
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["status"], "not_found");
    }
}
