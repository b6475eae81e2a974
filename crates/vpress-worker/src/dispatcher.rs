//! Delivery dispatcher: runs one job through compress and deliver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn, Instrument};

use vpress_delivery::DeliverySink;
use vpress_media::CompressionEngine;
use vpress_models::{JobId, JobRecord, JobStatus, StatusUpdate};
use vpress_store::JobStore;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryOutcome, RetryPolicy};

/// Attempts for a single status write.
const STORE_WRITE_ATTEMPTS: u32 = 3;
const STORE_WRITE_BACKOFF: Duration = Duration::from_millis(200);

/// Executes the pipeline for one job and reports progress only through the
/// job store.
///
/// Each run moves a `queued` record to `processing` and then to exactly one
/// of `awaiting_confirmation` or `failed`. Local files are never deleted
/// here; a failed job keeps its files for inspection or the reaper.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    engine: Arc<dyn CompressionEngine>,
    sink: Arc<dyn DeliverySink>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: Arc<dyn CompressionEngine>,
        sink: Arc<dyn DeliverySink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            engine,
            sink,
            retry,
        }
    }

    /// Run the pipeline for `job_id`. Never returns an error; every failure
    /// ends up on the record.
    pub async fn run(&self, job_id: &JobId) {
        let logger = JobLogger::new(job_id, "dispatch");
        let span = logger.create_span();
        self.run_inner(job_id, &logger).instrument(span).await
    }

    async fn run_inner(&self, job_id: &JobId, logger: &JobLogger) {
        let record = match self.store.get(job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                logger.log_warning("record disappeared before dispatch");
                return;
            }
            Err(e) => {
                logger.log_error(&format!("failed to load record: {}", e));
                return;
            }
        };

        if record.status != JobStatus::Queued {
            logger.log_warning(&format!("expected queued record, found {}", record.status));
            return;
        }

        logger.log_start(&format!("input {}", record.input_path.display()));
        if !self.transition(job_id, JobStatus::Processing, StatusUpdate::none()).await {
            return;
        }

        match self.execute(&record, logger).await {
            Ok((output, attempts)) => {
                metrics::record_delivered(attempts);
                let update = StatusUpdate::with_output(output.clone());
                if self.transition(job_id, JobStatus::AwaitingConfirmation, update).await {
                    logger.log_completion(&format!(
                        "delivered {} after {} attempt(s), awaiting confirmation",
                        output.display(),
                        attempts
                    ));
                }
            }
            Err(e) => {
                logger.at_stage(e.stage()).log_error(&e.to_string());
                metrics::record_failed(e.stage());
                self.transition(job_id, JobStatus::Failed, StatusUpdate::with_error(e.to_string()))
                    .await;
            }
        }
    }

    /// Compress, then deliver with retry. Returns the artifact and the number
    /// of delivery attempts.
    async fn execute(
        &self,
        record: &JobRecord,
        logger: &JobLogger,
    ) -> OrchestratorResult<(PathBuf, u32)> {
        let started = Instant::now();
        let output = self
            .engine
            .compress(&record.input_path)
            .await
            .map_err(|e| OrchestratorError::CompressionFailure(e.diagnostic()))?;
        metrics::record_compression_duration(started.elapsed().as_secs_f64());
        logger
            .at_stage("compress")
            .log_progress(&format!("artifact at {}", output.display()));

        let sink = &self.sink;
        let artifact = output.as_path();
        let metadata = &record.metadata;
        let outcome = retry_async(&self.retry, |attempt| async move {
            metrics::record_delivery_attempt();
            debug!(job_id = %record.job_id, attempt, sink = %sink.describe(), "Delivering artifact");
            sink.deliver(artifact, metadata).await
        })
        .await;

        match outcome {
            RetryOutcome::Delivered { attempts, .. } => Ok((output, attempts)),
            RetryOutcome::Exhausted { error, attempts } => Err(OrchestratorError::DeliveryFailure(
                format!("{} gave up after {} attempt(s): {}", sink.describe(), attempts, error),
            )),
        }
    }

    /// Write a status change, retrying briefly on store errors.
    ///
    /// Returns `false` when the write did not land.
    async fn transition(&self, job_id: &JobId, status: JobStatus, update: StatusUpdate) -> bool {
        let policy = RetryPolicy::new(STORE_WRITE_ATTEMPTS, STORE_WRITE_BACKOFF).named("status_write");
        let store = &self.store;
        let outcome = retry_async(&policy, |_| {
            let update = update.clone();
            async move { store.update_status(job_id, status, update).await }
        })
        .await;

        match outcome {
            RetryOutcome::Delivered { value: true, .. } => true,
            RetryOutcome::Delivered { value: false, .. } => {
                warn!(job_id = %job_id, status = %status, "Record removed mid-run; status not written");
                false
            }
            RetryOutcome::Exhausted { error, attempts } => {
                error!(
                    job_id = %job_id,
                    status = %status,
                    attempts,
                    error = %error,
                    "Failed to write job status"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingStore, StubEngine, StubSink};
    use chrono::Utc;
    use proptest::prelude::*;
    use vpress_models::JobMetadata;
    use vpress_store::MemoryJobStore;

    fn queued(job_id: &str, input: PathBuf) -> JobRecord {
        let mut metadata = JobMetadata::new();
        metadata.insert("org".into(), "acme".into());
        JobRecord::queued(JobId::from(job_id), input, metadata, Utc::now())
    }

    fn input_file(dir: &tempfile::TempDir) -> PathBuf {
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"raw").unwrap();
        input
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_awaits_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let sink = Arc::new(StubSink::failing_times(2));
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(StubEngine::succeeding(dir.path())),
            sink.clone(),
            RetryPolicy::new(3, Duration::from_secs(2)),
        );

        let record = queued("job-1", input_file(&dir));
        store.put(&record).await.unwrap();
        dispatcher.run(&record.job_id).await;

        assert_eq!(sink.attempt_count(), 3);
        assert_eq!(sink.intervals(), vec![Duration::from_secs(2), Duration::from_secs(4)]);

        let stored = store.get(&record.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::AwaitingConfirmation);
        assert_eq!(stored.output_path, Some(dir.path().join("compressed_in.mp4")));
        assert_eq!(sink.delivered.lock().unwrap()[0].get("org").map(String::as_str), Some("acme"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_delivery_fails_and_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let sink = Arc::new(StubSink::always_failing());
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(StubEngine::succeeding(dir.path())),
            sink.clone(),
            RetryPolicy::new(4, Duration::from_millis(500)),
        );

        let input = input_file(&dir);
        let record = queued("job-2", input.clone());
        store.put(&record).await.unwrap();
        dispatcher.run(&record.job_id).await;

        assert_eq!(sink.attempt_count(), 4);
        let stored = store.get(&record.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.last_error.unwrap().contains("4 attempt"));
        assert!(input.exists());
        assert!(dir.path().join("compressed_in.mp4").exists());
    }

    #[tokio::test]
    async fn test_compression_failure_skips_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let sink = Arc::new(StubSink::succeeding());
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(StubEngine::failing()),
            sink.clone(),
            RetryPolicy::default(),
        );

        let record = queued("job-3", input_file(&dir));
        store.put(&record).await.unwrap();
        dispatcher.run(&record.job_id).await;

        assert_eq!(sink.attempt_count(), 0);
        let stored = store.get(&record.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.last_error.unwrap().contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_missing_record_is_a_no_op() {
        let store = Arc::new(RecordingStore::default());
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(StubEngine::failing()),
            Arc::new(StubSink::succeeding()),
            RetryPolicy::default(),
        );

        dispatcher.run(&JobId::from("ghost")).await;
        assert!(store.history().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_transitions_are_monotonic(
            compress_ok in any::<bool>(),
            sink_failures in 0u32..6,
            max_attempts in 1u32..5,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            let (history, attempts) = rt.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let store = Arc::new(RecordingStore::default());
                let engine = if compress_ok {
                    StubEngine::succeeding(dir.path())
                } else {
                    StubEngine::failing()
                };
                let sink = Arc::new(StubSink::failing_times(sink_failures));
                let dispatcher = Dispatcher::new(
                    store.clone(),
                    Arc::new(engine),
                    sink.clone(),
                    RetryPolicy::new(max_attempts, Duration::from_millis(100)),
                );

                let record = queued("prop-job", input_file(&dir));
                store.put(&record).await.unwrap();
                dispatcher.run(&record.job_id).await;
                (store.history(), sink.attempt_count())
            });

            let expected_final = if compress_ok && sink_failures < max_attempts {
                JobStatus::AwaitingConfirmation
            } else {
                JobStatus::Failed
            };
            prop_assert_eq!(
                history.clone(),
                vec![JobStatus::Queued, JobStatus::Processing, expected_final]
            );
            for pair in history.windows(2) {
                prop_assert!(pair[0].can_transition_to(pair[1]));
            }

            let expected_attempts = if compress_ok { (sink_failures + 1).min(max_attempts) } else { 0 };
            prop_assert_eq!(attempts, expected_attempts);
        }
    }
}
