//! Reaper: reclaims orphaned files and jobs that were never confirmed.
//!
//! Each pass:
//! - Deletes `awaiting_confirmation` jobs older than the confirmation grace,
//!   files first, then the record
//! - Evicts terminal records older than the record TTL
//! - Deletes files in the scanned directories that are older than the
//!   retention window and not owned by an active job
//!
//! The two record sweeps only run on stores without native expiry; a
//! durable store ages records out on its own.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use vpress_models::{JobRecord, JobStatus};
use vpress_store::JobStore;

use crate::cleanup::{release_record_files, remove_file_best_effort};
use crate::clock::Clock;
use crate::error::OrchestratorResult;
use crate::metrics;

/// Reaper settings.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Directories swept for orphaned files (not recursive)
    pub scan_dirs: Vec<PathBuf>,
    /// Time between passes
    pub interval: Duration,
    /// Age after which an unowned file is deleted
    pub file_retention: Duration,
    /// Age after which an unconfirmed job is reclaimed
    pub confirmation_grace: Duration,
    /// Age after which a terminal record is evicted
    pub record_ttl: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            scan_dirs: vec![PathBuf::from("uploads"), PathBuf::from("outputs")],
            interval: Duration::from_secs(300),
            file_retention: Duration::from_secs(86400),
            confirmation_grace: Duration::from_secs(6 * 3600),
            record_ttl: Duration::from_secs(86400),
        }
    }
}

/// What one pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub orphan_files: usize,
    pub unconfirmed_jobs: usize,
    pub expired_records: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Reaper {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, config: ReaperConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Run passes on a fixed interval until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting reaper (interval: {:?})", self.config.interval);
        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("Reap pass failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reaper stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Run a single pass.
    pub async fn sweep(&self) -> OrchestratorResult<ReapReport> {
        let now = self.clock.now();
        let mut report = ReapReport::default();

        let mut records = self.store.list().await?;
        if !self.store.kind().expires_natively() {
            records = self.sweep_records(records, now, &mut report).await;
        }

        let protected = protected_paths(&records).await;
        for dir in &self.config.scan_dirs {
            report.orphan_files += self.sweep_dir(dir, now, &protected).await;
        }

        metrics::record_reaped("orphan", report.orphan_files, 0);
        metrics::record_reaped("unconfirmed", 0, report.unconfirmed_jobs);
        metrics::record_reaped("expired", 0, report.expired_records);

        if report.is_empty() {
            debug!("Reap pass found nothing to reclaim");
        } else {
            info!(
                orphan_files = report.orphan_files,
                unconfirmed_jobs = report.unconfirmed_jobs,
                expired_records = report.expired_records,
                "Reap pass complete"
            );
        }
        Ok(report)
    }

    /// Reclaim stale records. Returns the records left alive.
    async fn sweep_records(
        &self,
        records: Vec<JobRecord>,
        now: DateTime<Utc>,
        report: &mut ReapReport,
    ) -> Vec<JobRecord> {
        let mut survivors = Vec::with_capacity(records.len());

        for record in records {
            let unconfirmed = record.status == JobStatus::AwaitingConfirmation
                && older_than(record.time_in_status(now), self.config.confirmation_grace);
            let expired = record.status.is_terminal()
                && older_than(record.time_in_status(now), self.config.record_ttl);

            if unconfirmed {
                let files_removed = release_record_files(&record, "reap").await;
                match self.store.delete(&record.job_id).await {
                    Ok(()) => {
                        report.unconfirmed_jobs += 1;
                        warn!(
                            job_id = %record.job_id,
                            age_secs = record.age(now).num_seconds(),
                            waiting_secs = record.time_in_status(now).num_seconds(),
                            files_removed,
                            "Reclaimed job that was never confirmed"
                        );
                    }
                    Err(e) => error!(job_id = %record.job_id, "Failed to delete unconfirmed job: {}", e),
                }
            } else if expired {
                match self.store.delete(&record.job_id).await {
                    Ok(()) => {
                        report.expired_records += 1;
                        debug!(job_id = %record.job_id, status = %record.status, "Evicted expired record");
                    }
                    Err(e) => error!(job_id = %record.job_id, "Failed to evict expired record: {}", e),
                }
            } else {
                survivors.push(record);
            }
        }

        survivors
    }

    /// Delete old unowned files directly inside `dir`.
    async fn sweep_dir(&self, dir: &Path, now: DateTime<Utc>, protected: &HashSet<PathBuf>) -> usize {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %dir.display(), "Cannot scan directory: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), "Directory scan interrupted: {}", e);
                    break;
                }
            };

            let modified = match entry.metadata().await {
                Ok(meta) if meta.is_file() => match meta.modified() {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(_) => continue,
                },
                _ => continue,
            };
            if !older_than(now - modified, self.config.file_retention) {
                continue;
            }

            let path = entry.path();
            if is_protected(&path, protected).await {
                continue;
            }
            if remove_file_best_effort(None, &path, "orphan_sweep").await {
                info!(path = %path.display(), "Removed orphaned file");
                removed += 1;
            }
        }
        removed
    }
}

fn older_than(age: chrono::Duration, limit: Duration) -> bool {
    age.to_std().map(|age| age > limit).unwrap_or(false)
}

/// Files owned by active records, both as recorded and canonicalized.
async fn protected_paths(records: &[JobRecord]) -> HashSet<PathBuf> {
    let mut paths = HashSet::new();
    for record in records.iter().filter(|r| r.status.is_active()) {
        for path in record.local_files() {
            if let Ok(canonical) = tokio::fs::canonicalize(path).await {
                paths.insert(canonical);
            }
            paths.insert(path.to_path_buf());
        }
    }
    paths
}

async fn is_protected(path: &Path, protected: &HashSet<PathBuf>) -> bool {
    if protected.contains(path) {
        return true;
    }
    match tokio::fs::canonicalize(path).await {
        Ok(canonical) => protected.contains(&canonical),
        Err(_) => false,
    }
}
