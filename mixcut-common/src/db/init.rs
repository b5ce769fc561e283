//! Database initialization
//!
//! Creates the database file on first run and applies the schema
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before reporting it
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // PRAGMAs set here apply to every pooled connection, not just the first.
    // WAL allows readers alongside the single writer.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    // Several jobs update the store concurrently; give the pool room for them
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_jobs_table(pool).await?;
    create_job_tracks_table(pool).await?;
    create_job_queue_table(pool).await?;
    create_job_queue_dead_letter_table(pool).await?;
    Ok(())
}

async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            audio_bucket TEXT NOT NULL,
            audio_key TEXT NOT NULL,
            cue_bucket TEXT NOT NULL,
            cue_key TEXT NOT NULL,
            artwork_bucket TEXT,
            artwork_key TEXT,
            output_bucket TEXT,
            output_prefix TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_job_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_tracks (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id),
            track_number INTEGER NOT NULL CHECK (track_number > 0),
            title TEXT NOT NULL,
            performer TEXT,
            start_ms INTEGER NOT NULL CHECK (start_ms >= 0),
            duration_ms INTEGER,
            output_key TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (job_id, track_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Processing queue
///
/// A message is visible when `visible_at` has passed. Receiving it pushes
/// `visible_at` out by the visibility timeout and bumps `receive_count`.
async fn create_job_queue_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_queue (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            receive_count INTEGER NOT NULL DEFAULT 0,
            receipt TEXT,
            visible_at INTEGER NOT NULL,
            enqueued_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_queue_visible ON job_queue(visible_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_job_queue_dead_letter_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_queue_dead_letter (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            receive_count INTEGER NOT NULL,
            enqueued_at TEXT NOT NULL,
            dead_lettered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
