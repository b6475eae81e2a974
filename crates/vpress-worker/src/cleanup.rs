//! Best-effort file removal.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use vpress_models::{JobId, JobRecord};

/// Delete one file without ever failing the caller.
///
/// Returns `true` only when a file was actually removed. A missing file is
/// not an error; any other failure is logged with the job id, path and stage.
/// Orphaned files have no owning job and pass `None`.
pub async fn remove_file_best_effort(job_id: Option<&JobId>, path: &Path, stage: &str) -> bool {
    let job_id = job_id.map(JobId::as_str).unwrap_or("-");
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(job_id, path = %path.display(), stage, "Removed file");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(job_id, path = %path.display(), stage, "File already gone");
            false
        }
        Err(e) => {
            warn!(
                job_id,
                path = %path.display(),
                stage,
                error = %e,
                "Failed to remove file"
            );
            false
        }
    }
}

/// Delete every local file a record owns. Returns how many were removed.
pub async fn release_record_files(record: &JobRecord, stage: &str) -> usize {
    let mut removed = 0;
    for path in record.local_files() {
        if remove_file_best_effort(Some(&record.job_id), path, stage).await {
            removed += 1;
        }
    }
    removed
}
