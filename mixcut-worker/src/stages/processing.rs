//! Processing stage
//!
//! Handles one queue message end to end:
//!
//! 1. mark the job PROCESSING
//! 2. rebuild the job workspace
//! 3. fetch audio and sheet (concurrently)
//! 4. run the cutter
//! 5. enumerate the cut segments
//! 6. apply artwork, if the job has one uploaded
//! 7. apply genre and year from the sheet
//! 8. load track rows
//! 9. reconcile segment count against row count
//! 10. upload each segment and record its key on the paired row
//! 11. mark the job COMPLETED
//! 12. remove the workspace (always, best effort)
//!
//! Reconciliation happens before any upload, so a mismatch leaves storage
//! and track rows untouched.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use mixcut_common::cue::read_sheet_metadata;
use mixcut_common::db::JobUpdate;
use mixcut_common::{Error, JobStatus, ObjectLocation, Result, Track, WorkerMessage};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::StageOutcome;
use crate::services::{JobWorkspace, Tag};
use crate::storage::Delivery;
use crate::StageContext;

/// Names tried, in order, next to the uploaded artwork key
const ARTWORK_FILE_NAMES: [&str; 3] = ["artwork.png", "artwork.jpg", "artwork.jpeg"];

pub struct ProcessingStage {
    ctx: StageContext,
}

impl ProcessingStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Process one delivered message
    ///
    /// Failures are recorded on the job (FAILED) except transient ones on a
    /// delivery that will be retried, which return [`StageOutcome::Retry`]
    /// and leave the job PROCESSING. `Err` means the failure itself could
    /// not be recorded.
    pub async fn handle(&self, delivery: &Delivery) -> Result<StageOutcome> {
        let message = &delivery.message;
        let job_id = message.job_id;

        let Some(job) = self.ctx.records.get_job(job_id).await? else {
            warn!(job_id = %job_id, "Message refers to unknown job, dropping");
            return Ok(StageOutcome::Skipped);
        };

        if job.status.is_terminal() {
            warn!(job_id = %job_id, status = %job.status, "Job already finished, ignoring redelivered message");
            return Ok(StageOutcome::Skipped);
        }
        if !job.status.can_transition_to(JobStatus::Processing) {
            warn!(job_id = %job_id, status = %job.status, "Job is not ready for processing, dropping message");
            return Ok(StageOutcome::Skipped);
        }

        info!(
            job_id = %job_id,
            receive_count = delivery.receive_count,
            "Processing job"
        );

        match self.process(job_id, message).await {
            Ok(output) => {
                info!(job_id = %job_id, output = %output, "Job completed");
                Ok(StageOutcome::Completed(Some(output)))
            }
            Err(err) if err.is_transient() && self.will_redeliver(delivery) => {
                warn!(
                    job_id = %job_id,
                    receive_count = delivery.receive_count,
                    error = %err,
                    "Transient failure, leaving message for redelivery"
                );
                Ok(StageOutcome::Retry(err.to_string()))
            }
            Err(err) => {
                let message = err.to_string();
                error!(job_id = %job_id, kind = ?err.kind(), error = %message, "Processing failed");
                self.ctx
                    .records
                    .update_job(job_id, JobUpdate::failed(message.clone()))
                    .await?;
                Ok(StageOutcome::Failed(message))
            }
        }
    }

    fn will_redeliver(&self, delivery: &Delivery) -> bool {
        delivery.receive_count < self.ctx.config.queue.max_receive_count
    }

    async fn process(&self, job_id: Uuid, message: &WorkerMessage) -> Result<ObjectLocation> {
        self.ctx
            .records
            .update_job(job_id, JobUpdate::status(JobStatus::Processing))
            .await?;

        let workspace = JobWorkspace::prepare(&self.ctx.config.workspace_root, job_id).await?;
        let result = self.process_in(job_id, message, &workspace).await;
        workspace.cleanup().await;
        result
    }

    async fn process_in(
        &self,
        job_id: Uuid,
        message: &WorkerMessage,
        workspace: &JobWorkspace,
    ) -> Result<ObjectLocation> {
        let audio_path = workspace.source_audio();
        let sheet_path = workspace.source_sheet();
        let (audio, sheet) = (message.audio(), message.cue());
        let objects = &self.ctx.objects;

        tokio::try_join!(
            objects.get_to_file(&audio, &audio_path),
            objects.get_to_file(&sheet, &sheet_path),
        )?;

        self.ctx
            .cutter
            .cut(workspace.path(), &sheet_path, &audio_path)
            .await?;

        let outputs = workspace.output_files()?;
        debug!(job_id = %job_id, count = outputs.len(), "Cutter produced segments");

        if let Some(artwork) = message.artwork() {
            match self.fetch_artwork(&artwork, workspace).await? {
                Some(image) => {
                    for file in &outputs {
                        self.ctx.tagger.apply(file, Tag::Artwork(&image)).await?;
                    }
                }
                None => debug!(job_id = %job_id, "No artwork uploaded, skipping"),
            }
        }

        let sheet_text = tokio::fs::read(&sheet_path).await?;
        let metadata = read_sheet_metadata(&String::from_utf8_lossy(&sheet_text));
        if let Some(genre) = &metadata.genre {
            for file in &outputs {
                self.ctx.tagger.apply(file, Tag::Genre(genre)).await?;
            }
        }
        if let Some(year) = &metadata.release_year {
            for file in &outputs {
                self.ctx.tagger.apply(file, Tag::Year(year)).await?;
            }
        }

        let tracks = self.ctx.records.list_tracks(job_id).await?;
        if tracks.len() != outputs.len() {
            return Err(Error::Reconciliation {
                tracks: tracks.len(),
                outputs: outputs.len(),
            });
        }

        let prefix = self.output_prefix(job_id);
        for (track, file) in pair_outputs(&tracks, &outputs) {
            let file_name = file_name(file)?;
            let location = ObjectLocation::new(
                self.ctx.config.outputs_bucket.clone(),
                format!("{}/{}", prefix, file_name),
            );
            objects.put_from_file(file, &location).await?;
            self.ctx
                .records
                .set_track_output_key(track.id, &location.key)
                .await?;
            debug!(job_id = %job_id, track = track.track_number, key = %location.key, "Uploaded track");
        }

        let output = ObjectLocation::new(self.ctx.config.outputs_bucket.clone(), prefix);
        self.ctx
            .records
            .update_job(job_id, JobUpdate::completed(output.clone()))
            .await?;

        Ok(output)
    }

    /// Download the first artwork candidate that exists
    async fn fetch_artwork(
        &self,
        artwork: &ObjectLocation,
        workspace: &JobWorkspace,
    ) -> Result<Option<PathBuf>> {
        for name in ARTWORK_FILE_NAMES {
            let candidate = artwork.sibling(name);
            let local = workspace.file(name);
            match self.ctx.objects.get_to_file(&candidate, &local).await {
                Ok(()) => return Ok(Some(local)),
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// `{output_prefix}/{job_id}`, or just the id when no prefix is configured
    fn output_prefix(&self, job_id: Uuid) -> String {
        match self.ctx.config.output_prefix.trim_matches('/') {
            "" => job_id.to_string(),
            prefix => format!("{}/{}", prefix, job_id),
        }
    }
}

/// Pair track rows (ordered by track number) with cut segments (ordered by
/// file name)
///
/// When every segment name starts with a distinct number and those numbers
/// are exactly the rows' track numbers, segments are paired by that number.
/// Otherwise the lists are paired by position. Callers must have checked the
/// lengths match.
pub fn pair_outputs<'a>(tracks: &'a [Track], files: &'a [PathBuf]) -> Vec<(&'a Track, &'a PathBuf)> {
    if let Some(by_number) = numbered_files(files) {
        let numbers: HashSet<u32> = tracks.iter().map(|t| t.track_number).collect();
        let file_numbers: HashSet<u32> = by_number.keys().copied().collect();
        if numbers == file_numbers {
            return tracks
                .iter()
                .filter_map(|track| by_number.get(&track.track_number).map(|file| (track, *file)))
                .collect();
        }
    }

    warn!("Segment names do not carry the track numbers, pairing by sorted position");
    tracks.iter().zip(files.iter()).collect()
}

/// Map of leading file-name number to file, if every file has a distinct one
fn numbered_files(files: &[PathBuf]) -> Option<HashMap<u32, &PathBuf>> {
    let mut by_number = HashMap::with_capacity(files.len());
    for file in files {
        let name = file.file_name()?.to_str()?;
        let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
        let number: u32 = digits.parse().ok()?;
        if by_number.insert(number, file).is_some() {
            return None;
        }
    }
    Some(by_number)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Internal(format!("Output path has no file name: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn track(number: u32) -> Track {
        Track {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            track_number: number,
            title: format!("Track {}", number),
            performer: None,
            start_ms: i64::from(number) * 1000,
            duration_ms: None,
            output_key: None,
            created_at: Utc::now(),
        }
    }

    fn paired_names(pairs: &[(&Track, &PathBuf)]) -> Vec<(u32, String)> {
        pairs
            .iter()
            .map(|(t, f)| (t.track_number, f.file_name().unwrap().to_string_lossy().into_owned()))
            .collect()
    }

    #[test]
    fn test_pairs_by_embedded_number() {
        // Unpadded numbers sort lexically out of track order
        let tracks = vec![track(1), track(2), track(10)];
        let files: Vec<PathBuf> = ["1 A.m4a", "10 J.m4a", "2 B.m4a"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let pairs = pair_outputs(&tracks, &files);
        assert_eq!(
            paired_names(&pairs),
            vec![
                (1, "1 A.m4a".to_string()),
                (2, "2 B.m4a".to_string()),
                (10, "10 J.m4a".to_string()),
            ]
        );
    }

    #[test]
    fn test_falls_back_to_position_without_numbers() {
        let tracks = vec![track(4), track(7)];
        let files: Vec<PathBuf> = ["Intro.m4a", "Outro.m4a"].iter().map(PathBuf::from).collect();

        let pairs = pair_outputs(&tracks, &files);
        assert_eq!(
            paired_names(&pairs),
            vec![(4, "Intro.m4a".to_string()), (7, "Outro.m4a".to_string())]
        );
    }

    #[test]
    fn test_falls_back_when_numbers_do_not_match_rows() {
        let tracks = vec![track(3), track(5)];
        let files: Vec<PathBuf> = ["01 A.m4a", "02 B.m4a"].iter().map(PathBuf::from).collect();

        let pairs = pair_outputs(&tracks, &files);
        assert_eq!(
            paired_names(&pairs),
            vec![(3, "01 A.m4a".to_string()), (5, "02 B.m4a".to_string())]
        );
    }

    #[test]
    fn test_duplicate_numbers_fall_back() {
        let files: Vec<PathBuf> = ["01 A.m4a", "01 B.m4a"].iter().map(PathBuf::from).collect();
        assert!(numbered_files(&files).is_none());
    }
}
