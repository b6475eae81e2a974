//! The job store contract.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use vpress_models::{JobId, JobRecord, JobStatus, StatusUpdate};

use crate::error::StoreResult;

/// Which backend a store is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Redis,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Redis => "redis",
        }
    }

    /// Whether records disappear on their own after a TTL.
    pub fn expires_natively(&self) -> bool {
        matches!(self, StoreKind::Redis)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key/value storage of job records.
///
/// Both backends must behave identically. `update_status` is a plain
/// read-modify-write: concurrent updates of one record are last-write-wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite the record for `record.job_id`.
    async fn put(&self, record: &JobRecord) -> StoreResult<()>;

    /// Fetch a record.
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Merge `status` and `update` into an existing record.
    ///
    /// Returns `false` without writing anything when the record is absent.
    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<bool>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, job_id: &JobId) -> StoreResult<()>;

    /// Snapshot of every live record.
    async fn list(&self) -> StoreResult<Vec<JobRecord>>;

    /// Backend kind, fixed at construction.
    fn kind(&self) -> StoreKind;

    /// Release backend connections. Later calls may fail with `Closed`.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
