//! Job intake
//!
//! Creating a job only allocates its record and source keys; the caller then
//! uploads the files to those keys and starts the job. Once the job has
//! completed its outputs can be bundled into one zip archive.

use mixcut_common::{Error, Job, JobStatus, ObjectLocation, Result, Track};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{StageOutcome, ValidationStage};
use crate::services::{build_bundle, BUNDLE_FILE_NAME};
use crate::StageContext;

/// Artwork formats the processing stage looks for
pub const ARTWORK_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Job record with its track rows
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job: Job,
    pub tracks: Vec<Track>,
}

pub struct JobService {
    ctx: StageContext,
}

impl JobService {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Insert a PENDING_UPLOAD job with keys under `raw/{job_id}/`
    pub async fn create_job(&self, artwork_ext: Option<&str>) -> Result<Job> {
        let artwork_ext = artwork_ext
            .map(|ext| {
                let ext = ext.trim_start_matches('.').to_ascii_lowercase();
                if ARTWORK_EXTENSIONS.contains(&ext.as_str()) {
                    Ok(ext)
                } else {
                    Err(Error::InvalidInput(format!(
                        "Unsupported artwork extension '{}', expected one of {}",
                        ext,
                        ARTWORK_EXTENSIONS.join(", ")
                    )))
                }
            })
            .transpose()?;

        let bucket = &self.ctx.config.uploads_bucket;
        let mut job = Job::new(
            ObjectLocation::new(bucket.clone(), String::new()),
            ObjectLocation::new(bucket.clone(), String::new()),
            None,
        );
        let prefix = format!("raw/{}", job.id);
        job.audio.key = format!("{}/source.m4a", prefix);
        job.cue.key = format!("{}/source.cue", prefix);
        job.artwork = artwork_ext
            .map(|ext| ObjectLocation::new(bucket.clone(), format!("{}/artwork.{}", prefix, ext)));

        self.ctx.records.insert_job(&job).await?;
        info!(job_id = %job.id, "Job created");
        Ok(job)
    }

    /// Move a PENDING_UPLOAD job to VALIDATING and validate it
    pub async fn start_job(&self, job_id: Uuid) -> Result<StageOutcome> {
        let job = self.load(job_id).await?;
        if job.status != JobStatus::PendingUpload {
            return Err(Error::InvalidTransition {
                from: job.status,
                to: JobStatus::Validating,
            });
        }

        let started = self
            .ctx
            .records
            .transition_job(job_id, JobStatus::PendingUpload, JobStatus::Validating)
            .await?;
        if !started {
            // Lost a race with another start
            let current = self.load(job_id).await?;
            return Err(Error::InvalidTransition {
                from: current.status,
                to: JobStatus::Validating,
            });
        }

        info!(job_id = %job_id, "Job started");
        ValidationStage::new(self.ctx.clone()).run(job_id).await
    }

    pub async fn job_status(&self, job_id: Uuid) -> Result<JobStatusReport> {
        let job = self.load(job_id).await?;
        let tracks = self.ctx.records.list_tracks(job_id).await?;
        Ok(JobStatusReport { job, tracks })
    }

    /// Zip a COMPLETED job's outputs into `{output prefix}/bundle.zip`
    ///
    /// Entries are named by their key relative to the output prefix. An
    /// existing bundle is replaced, never included.
    pub async fn bundle_job(&self, job_id: Uuid) -> Result<ObjectLocation> {
        let job = self.load(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(Error::InvalidInput(format!(
                "Job {} is not completed (status {})",
                job_id, job.status
            )));
        }
        let output = job
            .output
            .ok_or_else(|| Error::InvalidInput(format!("Job {} has no outputs", job_id)))?;

        let prefix = output.key.trim_matches('/');
        let bundle = ObjectLocation::new(
            output.bucket.clone(),
            format!("{}/{}", prefix, BUNDLE_FILE_NAME),
        );

        let objects: Vec<ObjectLocation> = self
            .ctx
            .objects
            .list(&output.bucket, prefix)
            .await?
            .into_iter()
            .filter(|object| object.key != bundle.key)
            .collect();
        if objects.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Job {} has no output files to bundle",
                job_id
            )));
        }

        let mut entries = Vec::with_capacity(objects.len());
        for object in &objects {
            let name = object
                .key
                .strip_prefix(prefix)
                .unwrap_or(object.key.as_str())
                .trim_start_matches('/')
                .to_string();
            entries.push((name, self.ctx.objects.get(object).await?));
        }

        let archive = tokio::task::spawn_blocking(move || build_bundle(&entries))
            .await
            .map_err(|e| Error::Internal(format!("Bundle task failed: {}", e)))??;
        self.ctx.objects.put(&bundle, archive).await?;

        info!(job_id = %job_id, files = objects.len(), bundle = %bundle, "Outputs bundled");
        Ok(bundle)
    }

    async fn load(&self, job_id: Uuid) -> Result<Job> {
        self.ctx
            .records
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job {}", job_id)))
    }
}
