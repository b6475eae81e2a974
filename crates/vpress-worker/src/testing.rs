//! Stub collaborators shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use vpress_delivery::{DeliveryError, DeliveryResult, DeliverySink};
use vpress_media::{CompressionEngine, MediaError, MediaResult};
use vpress_models::{JobId, JobMetadata, JobRecord, JobStatus, StatusUpdate};
use vpress_store::{JobStore, MemoryJobStore, StoreKind, StoreResult};

/// Writes `compressed_<name>` next to the configured output dir, or fails.
pub struct StubEngine {
    output_dir: PathBuf,
    fail: bool,
    pub calls: AtomicU32,
}

impl StubEngine {
    pub fn succeeding(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            output_dir: PathBuf::new(),
            fail: true,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CompressionEngine for StubEngine {
    async fn compress(&self, input: &Path) -> MediaResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }
        let name = input.file_name().and_then(|n| n.to_str()).unwrap_or("artifact");
        let output = self.output_dir.join(format!("compressed_{}", name));
        tokio::fs::write(&output, b"compressed").await?;
        Ok(output)
    }
}

/// Holds every compression until the test opens the gate.
pub struct GatedEngine {
    inner: StubEngine,
    gate: Semaphore,
    entered: AtomicU32,
}

impl GatedEngine {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            inner: StubEngine::succeeding(output_dir),
            gate: Semaphore::new(0),
            entered: AtomicU32::new(0),
        }
    }

    /// Let one more compression through.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }

    /// Compressions started, including those still held at the gate.
    pub fn calls(&self) -> u32 {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompressionEngine for GatedEngine {
    async fn compress(&self, input: &Path) -> MediaResult<PathBuf> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.unwrap().forget();
        self.inner.compress(input).await
    }
}

/// Panics instead of compressing.
pub struct PanickingEngine;

#[async_trait]
impl CompressionEngine for PanickingEngine {
    async fn compress(&self, _input: &Path) -> MediaResult<PathBuf> {
        panic!("encoder crashed");
    }
}

/// Fails a fixed number of times, then acknowledges.
pub struct StubSink {
    failures_before_success: u32,
    attempts: Mutex<Vec<Instant>>,
    pub delivered: Mutex<Vec<JobMetadata>>,
}

impl StubSink {
    pub fn succeeding() -> Self {
        Self::failing_times(0)
    }

    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_before_success: n,
            attempts: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.lock().unwrap().len() as u32
    }

    /// Gaps between consecutive attempts.
    pub fn intervals(&self) -> Vec<Duration> {
        let attempts = self.attempts.lock().unwrap();
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl DeliverySink for StubSink {
    async fn deliver(&self, _file: &Path, metadata: &JobMetadata) -> DeliveryResult<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            attempts.len() as u32
        };
        if attempt <= self.failures_before_success {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "consumer unavailable".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(metadata.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }
}

/// Memory store that remembers every status it was asked to write.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryJobStore,
    history: Mutex<Vec<JobStatus>>,
}

impl RecordingStore {
    pub fn history(&self) -> Vec<JobStatus> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn put(&self, record: &JobRecord) -> StoreResult<()> {
        self.history.lock().unwrap().push(record.status);
        self.inner.put(record).await
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        self.inner.get(job_id).await
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<bool> {
        self.history.lock().unwrap().push(status);
        self.inner.update_status(job_id, status, update).await
    }

    async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        self.inner.delete(job_id).await
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        self.inner.list().await
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

/// Memory store that commits `awaiting_confirmation` at once but is slow to
/// acknowledge it, like a remote round-trip.
pub struct SlowAckStore {
    inner: MemoryJobStore,
    ack_delay: Duration,
}

impl SlowAckStore {
    pub fn new(ack_delay: Duration) -> Self {
        Self {
            inner: MemoryJobStore::new(),
            ack_delay,
        }
    }
}

#[async_trait]
impl JobStore for SlowAckStore {
    async fn put(&self, record: &JobRecord) -> StoreResult<()> {
        self.inner.put(record).await
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        self.inner.get(job_id).await
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<bool> {
        let written = self.inner.update_status(job_id, status, update).await?;
        if status == JobStatus::AwaitingConfirmation {
            tokio::time::sleep(self.ack_delay).await;
        }
        Ok(written)
    }

    async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        self.inner.delete(job_id).await
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        self.inner.list().await
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

/// Poll the store until the job has `status`.
pub async fn wait_for_status(store: &Arc<dyn JobStore>, job_id: &JobId, status: JobStatus) -> JobRecord {
    for _ in 0..1000 {
        if let Some(record) = store.get(job_id).await.unwrap() {
            if record.status == status {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached {}", job_id, status);
}

/// Poll the store until the job leaves `queued`/`processing`.
pub async fn wait_until_settled(store: &Arc<dyn JobStore>, job_id: &JobId) -> JobRecord {
    for _ in 0..1000 {
        if let Some(record) = store.get(job_id).await.unwrap() {
            if !matches!(record.status, JobStatus::Queued | JobStatus::Processing) {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never settled", job_id);
}
