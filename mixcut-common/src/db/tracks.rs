//! Track row queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::jobs::{parse_timestamp, parse_uuid};
use crate::models::{NewTrack, Track};
use crate::time::now_rfc3339;
use crate::{Error, Result};

/// Insert all track rows of a job in one transaction
///
/// Either every row lands or none does.
pub async fn insert_tracks(pool: &SqlitePool, job_id: Uuid, tracks: &[NewTrack]) -> Result<()> {
    let job_id = job_id.to_string();
    let created_at = now_rfc3339();

    let mut tx = pool.begin().await?;
    for track in tracks {
        sqlx::query(
            r#"
            INSERT INTO job_tracks (
                id, job_id, track_number, title, performer,
                start_ms, duration_ms, output_key, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&job_id)
        .bind(i64::from(track.track_number))
        .bind(&track.title)
        .bind(&track.performer)
        .bind(track.start_ms)
        .bind(track.duration_ms)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Load the track rows of a job ordered by track number
pub async fn load_tracks(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<Track>> {
    let rows = sqlx::query(
        r#"
        SELECT id, job_id, track_number, title, performer,
               start_ms, duration_ms, output_key, created_at
        FROM job_tracks
        WHERE job_id = ?
        ORDER BY track_number ASC
        "#,
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(track_from_row).collect()
}

/// Attach the uploaded object key to a track row
pub async fn set_output_key(pool: &SqlitePool, track_id: Uuid, output_key: &str) -> Result<()> {
    let result = sqlx::query("UPDATE job_tracks SET output_key = ? WHERE id = ?")
        .bind(output_key)
        .bind(track_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Track {}", track_id)));
    }

    Ok(())
}

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    let track_number: i64 = row.get("track_number");
    let track_number = u32::try_from(track_number)
        .map_err(|_| Error::Internal(format!("Track number out of range: {}", track_number)))?;

    Ok(Track {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        job_id: parse_uuid(&row.get::<String, _>("job_id"))?,
        track_number,
        title: row.get("title"),
        performer: row.get("performer"),
        start_ms: row.get("start_ms"),
        duration_ms: row.get("duration_ms"),
        output_key: row.get("output_key"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
