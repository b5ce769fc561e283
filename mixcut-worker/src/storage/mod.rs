//! Collaborator seams used by the stages
//!
//! Each trait is the contract; the SQLite and local-directory types in the
//! sub-modules are the implementations the binary ships with.

mod objects;
mod queue;
mod records;

pub use objects::LocalObjectStore;
pub use queue::SqliteJobQueue;
pub use records::SqliteRecordStore;

use std::path::Path;

use async_trait::async_trait;
use mixcut_common::db::JobUpdate;
use mixcut_common::{Job, JobStatus, NewTrack, ObjectLocation, Result, Track, WorkerMessage};
use uuid::Uuid;

/// Persistent job and track records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>>;

    async fn insert_job(&self, job: &Job) -> Result<()>;

    async fn update_job(&self, job_id: Uuid, update: JobUpdate) -> Result<()>;

    /// Compare-and-set status change; false if the job was not in `from`
    async fn transition_job(&self, job_id: Uuid, from: JobStatus, to: JobStatus) -> Result<bool>;

    /// Insert every row in one transaction
    async fn insert_tracks(&self, job_id: Uuid, tracks: &[NewTrack]) -> Result<()>;

    /// Track rows ordered by track number
    async fn list_tracks(&self, job_id: Uuid) -> Result<Vec<Track>>;

    async fn set_track_output_key(&self, track_id: Uuid, output_key: &str) -> Result<()>;
}

/// Object storage addressed by (bucket, key)
///
/// A missing object is reported as `Error::NotFound`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>>;

    /// Create or overwrite
    async fn put(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<()>;

    /// Objects whose key lies under `{prefix}/`, sorted by key
    ///
    /// A prefix with nothing under it yields an empty list.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectLocation>>;

    async fn get_to_file(&self, location: &ObjectLocation, path: &Path) -> Result<()> {
        let body = self.get(location).await?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    async fn put_from_file(&self, path: &Path, location: &ObjectLocation) -> Result<()> {
        let body = tokio::fs::read(path).await?;
        self.put(location, body).await
    }
}

/// One received queue message
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Handle for acknowledging this particular receive
    pub receipt: String,
    /// Times the message has been received, this delivery included
    pub receive_count: u32,
    pub message: WorkerMessage,
}

/// At-least-once message queue
///
/// A received message stays invisible for the visibility timeout; if it is
/// not acknowledged in time it is delivered again.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, message: &WorkerMessage) -> Result<()>;

    /// Next visible message, if any
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Delete a handled message
    async fn ack(&self, delivery: &Delivery) -> Result<()>;
}
