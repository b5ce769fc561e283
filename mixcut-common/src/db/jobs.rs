//! Job record queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Job, JobStatus, ObjectLocation};
use crate::time::now_rfc3339;
use crate::{Error, Result};

/// Single-row patch applied to a job
///
/// `status` is always written; the optional fields only overwrite when set.
/// `updated_at` is refreshed on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub output: Option<ObjectLocation>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            error_message: None,
            output: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            error_message: Some(message.into()),
            output: None,
        }
    }

    /// Completion with the output bucket and key prefix
    pub fn completed(output: ObjectLocation) -> Self {
        Self {
            status: JobStatus::Completed,
            error_message: None,
            output: Some(output),
        }
    }
}

/// Insert a new job record
pub async fn insert_job(pool: &SqlitePool, job: &Job) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (
            id, status, audio_bucket, audio_key, cue_bucket, cue_key,
            artwork_bucket, artwork_key, output_bucket, output_prefix,
            error_message, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.status.as_str())
    .bind(&job.audio.bucket)
    .bind(&job.audio.key)
    .bind(&job.cue.bucket)
    .bind(&job.cue.key)
    .bind(job.artwork.as_ref().map(|a| a.bucket.clone()))
    .bind(job.artwork.as_ref().map(|a| a.key.clone()))
    .bind(job.output.as_ref().map(|o| o.bucket.clone()))
    .bind(job.output.as_ref().map(|o| o.key.clone()))
    .bind(&job.error_message)
    .bind(job.created_at.to_rfc3339())
    .bind(job.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a job by id
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<Job>> {
    let row = sqlx::query(
        r#"
        SELECT id, status, audio_bucket, audio_key, cue_bucket, cue_key,
               artwork_bucket, artwork_key, output_bucket, output_prefix,
               error_message, created_at, updated_at
        FROM jobs
        WHERE id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| job_from_row(&row)).transpose()
}

/// Apply an update to a job
///
/// Returns `Error::NotFound` if no job has this id.
pub async fn update_job(pool: &SqlitePool, job_id: Uuid, update: &JobUpdate) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE jobs SET
            status = ?,
            error_message = COALESCE(?, error_message),
            output_bucket = COALESCE(?, output_bucket),
            output_prefix = COALESCE(?, output_prefix),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.status.as_str())
    .bind(&update.error_message)
    .bind(update.output.as_ref().map(|o| o.bucket.clone()))
    .bind(update.output.as_ref().map(|o| o.key.clone()))
    .bind(now_rfc3339())
    .bind(job_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Job {}", job_id)));
    }

    Ok(())
}

/// Move a job from `from` to `to` only if it is currently in `from`
///
/// Returns false when the job exists but is in another state.
pub async fn transition_job(
    pool: &SqlitePool,
    job_id: Uuid,
    from: JobStatus,
    to: JobStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now_rfc3339())
        .bind(job_id.to_string())
        .bind(from.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let id: String = row.get("id");
    let status: String = row.get("status");

    let artwork = optional_location(row.get("artwork_bucket"), row.get("artwork_key"));
    let output = optional_location(row.get("output_bucket"), row.get("output_prefix"));

    Ok(Job {
        id: parse_uuid(&id)?,
        status: status.parse()?,
        audio: ObjectLocation::new(
            row.get::<String, _>("audio_bucket"),
            row.get::<String, _>("audio_key"),
        ),
        cue: ObjectLocation::new(
            row.get::<String, _>("cue_bucket"),
            row.get::<String, _>("cue_key"),
        ),
        artwork,
        output,
        error_message: row.get("error_message"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn optional_location(bucket: Option<String>, key: Option<String>) -> Option<ObjectLocation> {
    match (bucket, key) {
        (Some(bucket), Some(key)) => Some(ObjectLocation::new(bucket, key)),
        _ => None,
    }
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", s, e)))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", s, e)))
}
