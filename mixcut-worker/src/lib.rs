//! mixcut-worker library interface
//!
//! Exposes the stages, their collaborators and the worker loop so the binary
//! and the integration tests drive the same code.

pub mod services;
pub mod stages;
pub mod storage;
pub mod utils;
pub mod worker;

use std::sync::Arc;

use mixcut_common::config::WorkerConfig;
use mixcut_common::Result;

use crate::services::{AtomicParsleyTagger, AudioCutter, M4aCutter, MetadataTagger};
use crate::storage::{
    JobQueue, LocalObjectStore, ObjectStore, RecordStore, SqliteJobQueue, SqliteRecordStore,
};

/// Collaborators shared by every stage invocation
///
/// Built once at startup; cloning only bumps reference counts.
#[derive(Clone)]
pub struct StageContext {
    pub config: Arc<WorkerConfig>,
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub cutter: Arc<dyn AudioCutter>,
    pub tagger: Arc<dyn MetadataTagger>,
}

impl StageContext {
    /// Wire the SQLite, local-directory and subprocess implementations
    pub async fn open(config: WorkerConfig) -> Result<Self> {
        let pool = mixcut_common::db::init_database(&config.database_path).await?;
        tracing::info!(database = %config.database_path.display(), "Database connection established");

        Ok(Self {
            records: Arc::new(SqliteRecordStore::new(pool.clone())),
            objects: Arc::new(LocalObjectStore::new(config.storage_root.clone())),
            queue: Arc::new(SqliteJobQueue::new(pool, config.queue.clone())),
            cutter: Arc::new(M4aCutter::new(config.cutter_binary.clone())),
            tagger: Arc::new(AtomicParsleyTagger::new(config.tagger_binary.clone())),
            config: Arc::new(config),
        })
    }
}
