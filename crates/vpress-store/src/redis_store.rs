//! Durable job store on Redis.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};

use vpress_models::{JobId, JobRecord, JobStatus, StatusUpdate};

use crate::error::{StoreError, StoreResult};
use crate::store::{JobStore, StoreKind};

/// Keys fetched per SCAN round-trip.
const SCAN_BATCH: usize = 100;

/// Job store keeping each record as a JSON blob under
/// `{prefix}:job:{job_id}`.
///
/// Every write refreshes the key's TTL, so a record lives for `ttl`
/// after its last change regardless of status.
pub struct RedisJobStore {
    conn: RwLock<Option<MultiplexedConnection>>,
    key_prefix: String,
    ttl: Duration,
}

impl RedisJobStore {
    /// Connect and verify the server answers `PING`.
    ///
    /// Any failure is reported as [`StoreError::Unavailable`]; callers
    /// configured for Redis must treat it as fatal.
    pub async fn connect(
        redis_url: &str,
        key_prefix: impl Into<String>,
        ttl: Duration,
    ) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::unavailable(format!("invalid Redis URL: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| StoreError::unavailable(format!("Redis PING failed: {}", e)))?;

        let key_prefix = key_prefix.into();
        info!(
            prefix = %key_prefix,
            ttl_secs = ttl.as_secs(),
            "Connected Redis job store"
        );

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            key_prefix,
            ttl,
        })
    }

    /// Redis key for a job.
    pub fn key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}", self.key_prefix, job_id)
    }

    fn key_pattern(&self) -> String {
        format!("{}:job:*", self.key_prefix)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        self.conn.read().await.clone().ok_or(StoreError::Closed)
    }

    async fn write(&self, conn: &mut MultiplexedConnection, record: &JobRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(self.key(&record.job_id), payload, self.ttl_secs())
            .await?;
        Ok(())
    }

    async fn read(&self, conn: &mut MultiplexedConnection, key: &str) -> StoreResult<Option<JobRecord>> {
        let payload: Option<String> = conn.get(key).await?;
        payload
            .map(|p| {
                serde_json::from_str(&p).map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put(&self, record: &JobRecord) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        self.write(&mut conn, record).await
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        self.read(&mut conn, &self.key(job_id)).await
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        update: StatusUpdate,
    ) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let Some(mut record) = self.read(&mut conn, &self.key(job_id)).await? else {
            debug!(job_id = %job_id, status = %status, "Status update for missing record ignored");
            return Ok(false);
        };

        record.apply(status, update, Utc::now());
        self.write(&mut conn, &record).await?;
        Ok(true)
    }

    async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.key(job_id)).await?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        let mut conn = self.connection().await?;
        let pattern = self.key_pattern();

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            // A key may expire between SCAN and GET
            if let Some(record) = self.read(&mut conn, &key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Redis
    }

    async fn close(&self) -> StoreResult<()> {
        if self.conn.write().await.take().is_some() {
            info!("Closed Redis job store connection");
        }
        Ok(())
    }
}
