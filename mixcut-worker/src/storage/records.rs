//! SQLite record store

use async_trait::async_trait;
use mixcut_common::db::{jobs, tracks, JobUpdate};
use mixcut_common::{Job, JobStatus, NewTrack, Result, Track};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::RecordStore;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Record store over the shared SQLite pool
///
/// Writes are retried on lock contention; reads are not.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        jobs::load_job(&self.pool, job_id).await
    }

    async fn insert_job(&self, job: &Job) -> Result<()> {
        retry_on_lock("insert job", self.max_lock_wait_ms, || {
            jobs::insert_job(&self.pool, job)
        })
        .await
    }

    async fn update_job(&self, job_id: Uuid, update: JobUpdate) -> Result<()> {
        retry_on_lock("update job", self.max_lock_wait_ms, || {
            jobs::update_job(&self.pool, job_id, &update)
        })
        .await
    }

    async fn transition_job(&self, job_id: Uuid, from: JobStatus, to: JobStatus) -> Result<bool> {
        retry_on_lock("transition job", self.max_lock_wait_ms, || {
            jobs::transition_job(&self.pool, job_id, from, to)
        })
        .await
    }

    async fn insert_tracks(&self, job_id: Uuid, rows: &[NewTrack]) -> Result<()> {
        retry_on_lock("insert tracks", self.max_lock_wait_ms, || {
            tracks::insert_tracks(&self.pool, job_id, rows)
        })
        .await
    }

    async fn list_tracks(&self, job_id: Uuid) -> Result<Vec<Track>> {
        tracks::load_tracks(&self.pool, job_id).await
    }

    async fn set_track_output_key(&self, track_id: Uuid, output_key: &str) -> Result<()> {
        retry_on_lock("set track output key", self.max_lock_wait_ms, || {
            tracks::set_output_key(&self.pool, track_id, output_key)
        })
        .await
    }
}
