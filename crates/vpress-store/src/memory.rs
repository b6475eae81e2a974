//! In-process job store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use vpress_models::{JobId, JobRecord, JobStatus, StatusUpdate};

use crate::error::StoreResult;
use crate::store::{JobStore, StoreKind};

/// Job store backed by a shared map.
///
/// The lock is held for exactly one operation and is never held while
/// awaiting anything else. Records never expire on their own; the reaper
/// is responsible for evicting them.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, record: &JobRecord) -> StoreResult<()> {
        self.jobs
            .lock()
            .await
            .insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        Ok(self.jobs.lock().await.get(job_id).cloned())
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<bool> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(job_id) {
            Some(record) => {
                record.apply(status, update, Utc::now());
                Ok(true)
            }
            None => {
                debug!(job_id = %job_id, status = %status, "Status update for missing record ignored");
                Ok(false)
            }
        }
    }

    async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        self.jobs.lock().await.remove(job_id);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        Ok(self.jobs.lock().await.values().cloned().collect())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}
