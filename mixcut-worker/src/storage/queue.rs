//! SQLite-backed processing queue
//!
//! Receiving a message hides it for the visibility timeout and bumps its
//! receive count. Messages that are still unacknowledged after
//! `max_receive_count` deliveries are moved to `job_queue_dead_letter` on the
//! next receive instead of being delivered again.

use async_trait::async_trait;
use chrono::Utc;
use mixcut_common::config::QueueConfig;
use mixcut_common::time::now_rfc3339;
use mixcut_common::{Error, Result, WorkerMessage};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{Delivery, JobQueue};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    config: QueueConfig,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, config: QueueConfig) -> Self {
        Self { pool, config }
    }

    /// Messages waiting or in flight
    pub async fn depth(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Bodies of dead-lettered messages, oldest first
    pub async fn dead_letters(&self) -> Result<Vec<WorkerMessage>> {
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM job_queue_dead_letter ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;
        bodies
            .iter()
            .map(|body| serde_json::from_str::<WorkerMessage>(body).map_err(Error::from))
            .collect()
    }

    /// Move exhausted messages to the dead-letter table
    async fn dead_letter_exhausted(&self, now_ms: i64) -> Result<u64> {
        let max = i64::from(self.config.max_receive_count);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO job_queue_dead_letter (id, body, receive_count, enqueued_at, dead_lettered_at)
            SELECT id, body, receive_count, enqueued_at, ?
            FROM job_queue
            WHERE visible_at <= ? AND receive_count >= ?
            "#,
        )
        .bind(now_rfc3339())
        .bind(now_ms)
        .bind(max)
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query("DELETE FROM job_queue WHERE visible_at <= ? AND receive_count >= ?")
            .bind(now_ms)
            .bind(max)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if moved > 0 {
            tracing::warn!(moved, max_receive_count = max, "Moved exhausted messages to dead-letter table");
        }
        Ok(moved)
    }

    async fn claim_next(&self, now_ms: i64) -> Result<Option<(String, String, i64)>> {
        let receipt = Uuid::new_v4().to_string();
        let hidden_until = now_ms + visibility_ms(&self.config);

        let row = sqlx::query(
            r#"
            UPDATE job_queue
            SET receive_count = receive_count + 1, receipt = ?, visible_at = ?
            WHERE id = (
                SELECT id FROM job_queue
                WHERE visible_at <= ?
                ORDER BY rowid
                LIMIT 1
            )
            RETURNING body, receipt, receive_count
            "#,
        )
        .bind(&receipt)
        .bind(hidden_until)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            (
                row.get::<String, _>("body"),
                row.get::<String, _>("receipt"),
                row.get::<i64, _>("receive_count"),
            )
        }))
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, message: &WorkerMessage) -> Result<()> {
        let body = serde_json::to_string(message)?;
        let id = Uuid::new_v4().to_string();
        let now_ms = Utc::now().timestamp_millis();

        let pool = &self.pool;
        let (id, body) = (id.as_str(), body.as_str());
        retry_on_lock("enqueue message", DEFAULT_MAX_LOCK_WAIT_MS, || async move {
            sqlx::query(
                "INSERT INTO job_queue (id, body, receive_count, receipt, visible_at, enqueued_at) \
                 VALUES (?, ?, 0, NULL, ?, ?)",
            )
            .bind(id)
            .bind(body)
            .bind(now_ms)
            .bind(now_rfc3339())
            .execute(pool)
            .await?;
            Ok(())
        })
        .await?;

        tracing::debug!(job_id = %message.job_id, "Enqueued processing message");
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>> {
        let now_ms = Utc::now().timestamp_millis();

        retry_on_lock("dead-letter exhausted messages", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.dead_letter_exhausted(now_ms)
        })
        .await?;

        let claimed = retry_on_lock("receive message", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.claim_next(now_ms)
        })
        .await?;

        let Some((body, receipt, receive_count)) = claimed else {
            return Ok(None);
        };

        let message: WorkerMessage = serde_json::from_str(&body)?;
        Ok(Some(Delivery {
            receipt,
            receive_count: u32::try_from(receive_count).unwrap_or(u32::MAX),
            message,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let pool = &self.pool;
        let receipt = delivery.receipt.as_str();
        let deleted = retry_on_lock("ack message", DEFAULT_MAX_LOCK_WAIT_MS, || async move {
            let result = sqlx::query("DELETE FROM job_queue WHERE receipt = ?")
                .bind(receipt)
                .execute(pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if deleted == 0 {
            // Visibility expired and the message was received again
            tracing::warn!(
                job_id = %delivery.message.job_id,
                "Ack ignored: receipt is stale"
            );
        }
        Ok(())
    }
}

fn visibility_ms(config: &QueueConfig) -> i64 {
    i64::try_from(config.visibility_timeout().as_millis()).unwrap_or(i64::MAX / 2)
}
