//! Processing queue message
//!
//! Produced by the validation stage, consumed by the processing stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Job, ObjectLocation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMessage {
    pub job_id: Uuid,
    pub audio_bucket: String,
    pub audio_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_key: Option<String>,
    pub cue_bucket: String,
    pub cue_key: String,
}

impl WorkerMessage {
    /// Build the message for a job that passed validation
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            audio_bucket: job.audio.bucket.clone(),
            audio_key: job.audio.key.clone(),
            artwork_bucket: job.artwork.as_ref().map(|a| a.bucket.clone()),
            artwork_key: job.artwork.as_ref().map(|a| a.key.clone()),
            cue_bucket: job.cue.bucket.clone(),
            cue_key: job.cue.key.clone(),
        }
    }

    pub fn audio(&self) -> ObjectLocation {
        ObjectLocation::new(self.audio_bucket.clone(), self.audio_key.clone())
    }

    pub fn cue(&self) -> ObjectLocation {
        ObjectLocation::new(self.cue_bucket.clone(), self.cue_key.clone())
    }

    /// Artwork reference, present only when both bucket and key are set
    pub fn artwork(&self) -> Option<ObjectLocation> {
        match (&self.artwork_bucket, &self.artwork_key) {
            (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => {
                Some(ObjectLocation::new(bucket.clone(), key.clone()))
            }
            _ => None,
        }
    }
}
