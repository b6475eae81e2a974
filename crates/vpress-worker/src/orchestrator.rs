//! Job orchestrator: the entry points for submit, confirm, query and purge.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{error, info, warn};

use vpress_delivery::DeliverySink;
use vpress_media::CompressionEngine;
use vpress_models::{validate_job_id, JobId, JobMetadata, JobRecord, JobStatus, StatusReport, StatusUpdate};
use vpress_store::{JobStore, StoreKind};

use crate::cleanup::release_record_files;
use crate::clock::{Clock, SystemClock};
use crate::config::WorkerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::reaper::Reaper;

/// Returned by `submit` as soon as the job is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub status: &'static str,
    pub job_id: JobId,
}

impl SubmitReceipt {
    fn accepted(job_id: JobId) -> Self {
        Self {
            status: "accepted",
            job_id,
        }
    }
}

/// Result of a successful confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// This call released the job's files.
    Completed { files_removed: usize },
    /// An earlier call already did.
    AlreadyCompleted,
}

impl ConfirmOutcome {
    /// Status the job is in after the call.
    pub fn status(&self) -> JobStatus {
        JobStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub store_backend: StoreKind,
}

/// Owns the job lifecycle.
///
/// `submit` records the job and hands it to a background dispatcher run;
/// the caller learns the outcome only through `query`. At most
/// `max_concurrent_jobs` runs execute at once; the rest wait in `queued`.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    /// Ids with a live run, flagged when re-submitted during that run
    in_flight: Arc<Mutex<HashMap<JobId, bool>>>,
    intake_reaper: Option<Arc<Reaper>>,
    shutdown_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: Arc<dyn CompressionEngine>,
        sink: Arc<dyn DeliverySink>,
        config: &WorkerConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), engine, sink, config.retry_policy());
        Self {
            store,
            dispatcher: Arc::new(dispatcher),
            clock: Arc::new(SystemClock),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            intake_reaper: None,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Replace the clock used for `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run a reap pass in the background after every submit.
    pub fn with_intake_reaper(mut self, reaper: Arc<Reaper>) -> Self {
        self.intake_reaper = Some(reaper);
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Record a new job as `queued` and launch its dispatcher run.
    ///
    /// Re-submitting an id overwrites its record. If a run for that id is
    /// still in flight no second run is started alongside it; once the live
    /// run ends the same task makes one more pass, which dispatches the
    /// record if it is still `queued`.
    pub async fn submit(
        &self,
        job_id: JobId,
        input_path: PathBuf,
        metadata: JobMetadata,
    ) -> OrchestratorResult<SubmitReceipt> {
        validate_job_id(job_id.as_str())?;

        let record = JobRecord::queued(job_id.clone(), input_path, metadata, self.clock.now());
        self.store.put(&record).await?;
        metrics::record_submitted();

        let newly_tracked = {
            let mut in_flight = self.in_flight.lock().await;
            let inserted = match in_flight.get_mut(&job_id) {
                Some(resubmitted) => {
                    *resubmitted = true;
                    false
                }
                None => {
                    in_flight.insert(job_id.clone(), false);
                    true
                }
            };
            metrics::set_in_flight(in_flight.len());
            inserted
        };

        if newly_tracked {
            self.launch(job_id.clone());
        } else {
            warn!(
                job_id = %job_id,
                "Job re-submitted while a run is in flight; record overwritten, picked up after that run"
            );
        }

        if let Some(reaper) = &self.intake_reaper {
            let reaper = reaper.clone();
            tokio::spawn(async move {
                if let Err(e) = reaper.sweep().await {
                    warn!("Intake reap pass failed: {}", e);
                }
            });
        }

        info!(job_id = %job_id, input = %record.input_path.display(), "Job accepted");
        Ok(SubmitReceipt::accepted(job_id))
    }

    /// Spawn a supervised dispatcher run.
    ///
    /// The id leaves `in_flight` only under the same lock `submit` takes, so
    /// a re-submission either sees the id gone and launches afresh, or flags
    /// it and gets a follow-up pass here.
    fn launch(&self, job_id: JobId) {
        let dispatcher = self.dispatcher.clone();
        let permits = self.permits.clone();
        let in_flight = self.in_flight.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            loop {
                let run = {
                    let dispatcher = dispatcher.clone();
                    let permits = permits.clone();
                    let job_id = job_id.clone();
                    tokio::spawn(async move {
                        // Held for the whole run
                        let _permit = match permits.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return,
                        };
                        dispatcher.run(&job_id).await;
                    })
                };
                let panicked = matches!(run.await, Err(e) if e.is_panic());

                let mut in_flight = in_flight.lock().await;
                let resubmitted = in_flight.get(&job_id).copied().unwrap_or(false);

                if panicked {
                    error!(job_id = %job_id, "Dispatcher run panicked");
                    fail_abandoned(store.as_ref(), &job_id, resubmitted).await;
                }

                if resubmitted {
                    in_flight.insert(job_id.clone(), false);
                    info!(job_id = %job_id, "Running again for re-submitted job");
                    continue;
                }

                in_flight.remove(&job_id);
                metrics::set_in_flight(in_flight.len());
                break;
            }
        });
    }

    /// Acknowledge receipt of a delivered artifact and release local files.
    pub async fn confirm(&self, job_id: &JobId) -> OrchestratorResult<ConfirmOutcome> {
        let logger = JobLogger::new(job_id, "confirm");
        let record = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(job_id.clone()))?;

        match record.status {
            JobStatus::Completed => {
                logger.log_progress("already completed");
                Ok(ConfirmOutcome::AlreadyCompleted)
            }
            JobStatus::AwaitingConfirmation => {
                let files_removed = release_record_files(&record, "confirm").await;
                let written = self
                    .store
                    .update_status(job_id, JobStatus::Completed, StatusUpdate::none())
                    .await?;
                if !written {
                    logger.log_warning("record removed while confirming");
                }
                metrics::record_confirmed();
                logger.log_completion(&format!("confirmed, {} file(s) released", files_removed));
                Ok(ConfirmOutcome::Completed { files_removed })
            }
            status => Err(OrchestratorError::NotReady {
                job_id: job_id.clone(),
                status,
            }),
        }
    }

    /// Current state of a job; `not_found` when there is no record.
    pub async fn query(&self, job_id: &JobId) -> OrchestratorResult<StatusReport> {
        Ok(match self.store.get(job_id).await? {
            Some(record) => StatusReport::from(&record),
            None => StatusReport::not_found(job_id.clone()),
        })
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            store_backend: self.store.kind(),
        }
    }

    /// Remove a terminal job. A failed job's retained files go with it.
    pub async fn purge(&self, job_id: &JobId) -> OrchestratorResult<JobStatus> {
        let record = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(job_id.clone()))?;

        if !record.status.is_terminal() {
            return Err(OrchestratorError::NotReady {
                job_id: job_id.clone(),
                status: record.status,
            });
        }

        if record.status == JobStatus::Failed {
            release_record_files(&record, "purge").await;
        }
        self.store.delete(job_id).await?;
        info!(job_id = %job_id, status = %record.status, "Job purged");
        Ok(record.status)
    }

    /// Dispatcher runs not yet finished, including those waiting for a slot.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Wait for in-flight runs, then close the store.
    pub async fn shutdown(&self) -> OrchestratorResult<()> {
        info!("Waiting for in-flight jobs...");
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            let remaining = self.in_flight().await;
            if remaining == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(remaining, "Shutdown timeout reached with jobs still in flight");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.store.close().await?;
        info!("Orchestrator stopped");
        Ok(())
    }
}

/// Mark a job whose run died without finishing as failed.
///
/// A `queued` record left by a re-submission is kept for the follow-up pass.
async fn fail_abandoned(store: &dyn JobStore, job_id: &JobId, resubmitted: bool) {
    match store.get(job_id).await {
        Ok(Some(record))
            if record.status == JobStatus::Processing
                || (record.status == JobStatus::Queued && !resubmitted) =>
        {
            let update = StatusUpdate::with_error("dispatcher run aborted unexpectedly");
            match store.update_status(job_id, JobStatus::Failed, update).await {
                Ok(_) => metrics::record_failed("dispatch"),
                Err(e) => error!(job_id = %job_id, "Failed to mark abandoned job as failed: {}", e),
            }
        }
        Ok(_) => {}
        Err(e) => error!(job_id = %job_id, "Failed to load abandoned job: {}", e),
    }
}
