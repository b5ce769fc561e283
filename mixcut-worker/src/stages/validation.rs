//! Validation stage
//!
//! Runs once per job, right after the job leaves PENDING_UPLOAD:
//! fetch sheet → parse → validate → insert track rows → enqueue → QUEUED.
//! Any failure marks the job FAILED with the error text.

use mixcut_common::cue::{self, track_rows};
use mixcut_common::db::JobUpdate;
use mixcut_common::{Error, Job, JobStatus, Result, WorkerMessage};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::StageOutcome;
use crate::StageContext;

pub struct ValidationStage {
    ctx: StageContext,
}

impl ValidationStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Validate a job in VALIDATING
    ///
    /// Returns `Err` only when the job does not exist or its failure could
    /// not be recorded.
    pub async fn run(&self, job_id: Uuid) -> Result<StageOutcome> {
        let job = self
            .ctx
            .records
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job {}", job_id)))?;

        if job.status != JobStatus::Validating {
            warn!(job_id = %job_id, status = %job.status, "Job is not validating, skipping");
            return Ok(StageOutcome::Skipped);
        }

        match self.validate_and_enqueue(&job).await {
            Ok(track_count) => {
                info!(job_id = %job_id, track_count, "Job validated and queued");
                Ok(StageOutcome::Completed(None))
            }
            Err(err) => {
                let message = err.to_string();
                error!(job_id = %job_id, kind = ?err.kind(), error = %message, "Validation failed");
                self.ctx
                    .records
                    .update_job(job_id, JobUpdate::failed(message.clone()))
                    .await?;
                Ok(StageOutcome::Failed(message))
            }
        }
    }

    async fn validate_and_enqueue(&self, job: &Job) -> Result<usize> {
        let body = self.ctx.objects.get(&job.cue).await?;
        let text = String::from_utf8_lossy(&body);

        let sheet = cue::parse(&text);
        let tracks = cue::validate(&sheet)?;
        let rows = track_rows(&tracks);

        self.ctx.records.insert_tracks(job.id, &rows).await?;
        self.ctx.queue.enqueue(&WorkerMessage::for_job(job)).await?;

        // A fast worker may already have moved the job to PROCESSING
        let advanced = self
            .ctx
            .records
            .transition_job(job.id, JobStatus::Validating, JobStatus::Queued)
            .await?;
        if !advanced {
            info!(job_id = %job.id, "Job already picked up by a worker");
        }

        Ok(rows.len())
    }
}
