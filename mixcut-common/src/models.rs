//! Job and track models
//!
//! A job moves through six states:
//! PENDING_UPLOAD → VALIDATING → QUEUED → PROCESSING → COMPLETED
//! with FAILED reachable from VALIDATING and PROCESSING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Job workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, waiting for the source files to be uploaded
    PendingUpload,
    /// Sheet is being parsed and validated
    Validating,
    /// Track rows persisted, processing message enqueued
    Queued,
    /// Worker is cutting and tagging
    Processing,
    /// All outputs uploaded and track rows updated
    Completed,
    /// Failed with an error message recorded
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::PendingUpload,
        JobStatus::Validating,
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Persisted string form
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::PendingUpload => "PENDING_UPLOAD",
            JobStatus::Validating => "VALIDATING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows `self → next`
    ///
    /// PROCESSING → PROCESSING is allowed: a redelivered message re-marks the
    /// job after a run that was cut short. VALIDATING → PROCESSING covers a
    /// worker receiving the message before the validation stage has recorded
    /// QUEUED.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (PendingUpload, Validating)
                | (Validating, Queued)
                | (Validating, Failed)
                | (Validating, Processing)
                | (Queued, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown job status: {}", s)))
    }
}

/// Bucket + key pair addressing one object in the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Directory part of the key, `None` for keys at the bucket root
    pub fn key_prefix(&self) -> Option<&str> {
        self.key
            .rsplit_once('/')
            .map(|(prefix, _)| prefix)
            .filter(|prefix| !prefix.is_empty())
    }

    /// Sibling object in the same key prefix
    pub fn sibling(&self, file_name: &str) -> ObjectLocation {
        let key = match self.key_prefix() {
            Some(prefix) => format!("{}/{}", prefix, file_name),
            None => file_name.to_string(),
        };
        ObjectLocation::new(self.bucket.clone(), key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// One audio-cutting request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub audio: ObjectLocation,
    pub cue: ObjectLocation,
    pub artwork: Option<ObjectLocation>,
    /// Output bucket + key prefix, set on completion
    pub output: Option<ObjectLocation>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New job in PENDING_UPLOAD
    pub fn new(audio: ObjectLocation, cue: ObjectLocation, artwork: Option<ObjectLocation>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::PendingUpload,
            audio,
            cue,
            artwork,
            output: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persisted track row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub job_id: Uuid,
    pub track_number: u32,
    pub title: String,
    pub performer: Option<String>,
    pub start_ms: i64,
    pub duration_ms: Option<i64>,
    pub output_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Track row to insert after validation
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub track_number: u32,
    pub title: String,
    pub performer: Option<String>,
    pub start_ms: i64,
    pub duration_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("RUNNING".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_persisted_form() {
        let json = serde_json::to_string(&JobStatus::PendingUpload).unwrap();
        assert_eq!(json, "\"PENDING_UPLOAD\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(JobStatus::PendingUpload.can_transition_to(JobStatus::Validating));
        assert!(JobStatus::Validating.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));

        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Validating));
        assert!(!JobStatus::PendingUpload.can_transition_to(JobStatus::Processing));
        for next in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_location_prefix_and_sibling() {
        let loc = ObjectLocation::new("uploads", "raw/abc/artwork.png");
        assert_eq!(loc.key_prefix(), Some("raw/abc"));
        assert_eq!(loc.sibling("artwork.jpg").key, "raw/abc/artwork.jpg");

        let root = ObjectLocation::new("uploads", "artwork.png");
        assert_eq!(root.key_prefix(), None);
        assert_eq!(root.sibling("artwork.jpg").key, "artwork.jpg");
    }

    #[test]
    fn test_new_job_is_pending_upload() {
        let job = Job::new(
            ObjectLocation::new("uploads", "raw/x/source.m4a"),
            ObjectLocation::new("uploads", "raw/x/source.cue"),
            None,
        );
        assert_eq!(job.status, JobStatus::PendingUpload);
        assert!(job.output.is_none());
        assert!(job.error_message.is_none());
    }
}
