//! Shared test helpers for mixcut-worker integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mixcut_common::config::{QueueConfig, WorkerConfig};
use mixcut_common::{Error, Job, ObjectLocation, Result};
use mixcut_worker::services::{AudioCutter, MetadataTagger, Tag};
use mixcut_worker::storage::{LocalObjectStore, ObjectStore, SqliteJobQueue, SqliteRecordStore};
use mixcut_worker::StageContext;
use tempfile::TempDir;

pub const TWO_TRACK_SHEET: &str = r#"REM GENRE "Deep House"
REM DATE 2024
PERFORMER "Resident"
TITLE "Friday Night"
FILE "source.m4a" MP4
  TRACK 01 AUDIO
    TITLE "First"
    PERFORMER "Artist One"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Second"
    PERFORMER "Artist Two"
    INDEX 01 03:00:00
"#;

/// Cutter that writes a fixed list of segment files instead of running m4acut
pub struct FakeCutter {
    segments: Mutex<Vec<String>>,
    fail_with: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl FakeCutter {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            segments: Mutex::new(segments.iter().map(|s| s.to_string()).collect()),
            fail_with: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_segments(&self, segments: &[&str]) {
        *self.segments.lock().unwrap() = segments.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_with(&self, detail: &str) {
        *self.fail_with.lock().unwrap() = Some(detail.to_string());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCutter for FakeCutter {
    async fn cut(&self, workdir: &Path, sheet: &Path, audio: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(sheet.is_file(), "sheet not downloaded before cutting");
        assert!(audio.is_file(), "audio not downloaded before cutting");

        if let Some(detail) = self.fail_with.lock().unwrap().clone() {
            return Err(Error::Subprocess {
                program: "m4acut".to_string(),
                detail,
            });
        }

        let segments = self.segments.lock().unwrap().clone();
        for name in segments {
            std::fs::write(workdir.join(&name), format!("segment {}", name))?;
        }
        Ok(())
    }
}

/// One tagger invocation: output file name, flag and value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCall {
    pub file: String,
    pub tag: String,
    pub value: String,
}

/// Tagger that records what it was asked to do
#[derive(Default)]
pub struct RecordingTagger {
    calls: Mutex<Vec<TagCall>>,
}

impl RecordingTagger {
    pub fn calls(&self) -> Vec<TagCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, tag: &str) -> Vec<TagCall> {
        self.calls().into_iter().filter(|c| c.tag == tag).collect()
    }
}

#[async_trait]
impl MetadataTagger for RecordingTagger {
    async fn apply(&self, file: &Path, tag: Tag<'_>) -> Result<()> {
        assert!(file.is_file(), "tagging a file that does not exist");
        let (name, value) = match tag {
            Tag::Artwork(path) => {
                assert!(path.is_file(), "artwork not downloaded");
                ("artwork", path.file_name().unwrap().to_string_lossy().into_owned())
            }
            Tag::Genre(genre) => ("genre", genre.to_string()),
            Tag::Year(year) => ("year", year.to_string()),
        };
        self.calls.lock().unwrap().push(TagCall {
            file: file.file_name().unwrap().to_string_lossy().into_owned(),
            tag: name.to_string(),
            value,
        });
        Ok(())
    }
}

/// Object store whose reads time out a set number of times
pub struct FlakyObjectStore {
    inner: LocalObjectStore,
    failures_left: AtomicU32,
}

impl FlakyObjectStore {
    pub fn new(inner: LocalObjectStore, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "object store timed out",
            )));
        }
        self.inner.get(location).await
    }

    async fn put(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<()> {
        self.inner.put(location, body).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectLocation>> {
        self.inner.list(bucket, prefix).await
    }
}

/// Isolated stores, fakes and scratch directories for one test
pub struct TestEnv {
    pub dir: TempDir,
    pub ctx: StageContext,
    pub records: Arc<SqliteRecordStore>,
    pub objects: Arc<LocalObjectStore>,
    pub queue: Arc<SqliteJobQueue>,
    pub cutter: Arc<FakeCutter>,
    pub tagger: Arc<RecordingTagger>,
}

impl TestEnv {
    pub async fn new(segments: &[&str]) -> Self {
        Self::with_queue(segments, QueueConfig::default()).await
    }

    pub async fn with_queue(segments: &[&str], queue_config: QueueConfig) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = WorkerConfig {
            database_path: dir.path().join("mixcut.db"),
            storage_root: dir.path().join("objects"),
            workspace_root: dir.path().join("work"),
            queue: queue_config,
            ..WorkerConfig::default()
        };

        let pool = mixcut_common::db::init_database(&config.database_path)
            .await
            .expect("database");
        let records = Arc::new(SqliteRecordStore::new(pool.clone()));
        let objects = Arc::new(LocalObjectStore::new(config.storage_root.clone()));
        let queue = Arc::new(SqliteJobQueue::new(pool, config.queue.clone()));
        let cutter = Arc::new(FakeCutter::new(segments));
        let tagger = Arc::new(RecordingTagger::default());

        let ctx = StageContext {
            config: Arc::new(config),
            records: records.clone(),
            objects: objects.clone(),
            queue: queue.clone(),
            cutter: cutter.clone(),
            tagger: tagger.clone(),
        };

        Self {
            dir,
            ctx,
            records,
            objects,
            queue,
            cutter,
            tagger,
        }
    }

    /// Swap the object store seen by the stages
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.ctx.objects = objects;
        self
    }

    /// Put the job's source files where the job record says they are
    pub async fn upload_sources(&self, job: &Job, sheet: &str) {
        self.objects
            .put(&job.audio, b"fake m4a audio".to_vec())
            .await
            .expect("upload audio");
        self.objects
            .put(&job.cue, sheet.as_bytes().to_vec())
            .await
            .expect("upload sheet");
    }

    pub async fn upload(&self, location: &ObjectLocation, body: &[u8]) {
        self.objects.put(location, body.to_vec()).await.expect("upload");
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.ctx.config.workspace_root.clone()
    }

    pub fn output_path(&self, key: &str) -> PathBuf {
        self.ctx
            .config
            .storage_root
            .join(&self.ctx.config.outputs_bucket)
            .join(key)
    }
}
