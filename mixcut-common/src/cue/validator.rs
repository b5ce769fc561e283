//! Track list validation
//!
//! Invariants enforced on a parsed sheet:
//! 1. At least one track
//! 2. Track numbers are positive and unique
//! 3. Titles are non-blank
//! 4. Start offsets are non-negative
//! 5. Start offsets strictly increase in start order, and track numbers
//!    follow the same order (a later-numbered track may not start earlier)

use std::collections::HashSet;
use thiserror::Error;

use super::{CueSheet, CueTrack};

/// First invariant violation found in a sheet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No tracks found in CUE sheet")]
    NoTracks,

    #[error("Invalid track number: {0}")]
    InvalidTrackNumber(u32),

    #[error("Track {0} is missing a TITLE")]
    MissingTitle(u32),

    #[error("Track {0} has invalid start time")]
    InvalidStartTime(u32),

    #[error("Duplicate track number: {0}")]
    DuplicateTrackNumber(u32),

    /// Shares its start with the preceding track, or carries a lower number
    /// than a track that starts before it
    #[error("Track {0} starts before or at same time as previous track")]
    StartNotIncreasing(u32),
}

impl ValidationError {
    /// Offending track number, if the violation concerns one track
    pub fn track_number(&self) -> Option<u32> {
        match self {
            ValidationError::NoTracks => None,
            ValidationError::InvalidTrackNumber(n)
            | ValidationError::MissingTitle(n)
            | ValidationError::InvalidStartTime(n)
            | ValidationError::DuplicateTrackNumber(n)
            | ValidationError::StartNotIncreasing(n) => Some(*n),
        }
    }
}

/// Validate a parsed sheet
///
/// Returns the tracks sorted by start offset. That order is canonical from
/// here on: it is the order rows are inserted in and the order output files
/// are matched against.
pub fn validate(sheet: &CueSheet) -> Result<Vec<CueTrack>, ValidationError> {
    if sheet.tracks.is_empty() {
        return Err(ValidationError::NoTracks);
    }

    let mut sorted = sheet.tracks.clone();
    sorted.sort_by_key(|track| track.start_ms);

    let mut seen = HashSet::with_capacity(sorted.len());
    for track in &sorted {
        if track.track_number == 0 {
            return Err(ValidationError::InvalidTrackNumber(track.track_number));
        }
        if track.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle(track.track_number));
        }
        if track.start_ms < 0 {
            return Err(ValidationError::InvalidStartTime(track.track_number));
        }
        if !seen.insert(track.track_number) {
            return Err(ValidationError::DuplicateTrackNumber(track.track_number));
        }
    }

    for pair in sorted.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.start_ms <= previous.start_ms || current.track_number < previous.track_number {
            return Err(ValidationError::StartNotIncreasing(current.track_number));
        }
    }

    Ok(sorted)
}
