//! CUE sheet handling
//!
//! [`parse`] extracts whatever it can recognize from a sheet and never fails;
//! [`validate`] enforces the track list invariants and returns the tracks in
//! canonical (start offset) order.

mod parser;
mod validator;

pub use parser::{parse, read_sheet_metadata, SheetMetadata};
pub use validator::{validate, ValidationError};

use serde::{Deserialize, Serialize};

use crate::models::NewTrack;

/// One track entry recognized in a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueTrack {
    pub track_number: u32,
    pub title: String,
    pub performer: Option<String>,
    pub start_ms: i64,
}

/// Parsed sheet: disc-level fields plus tracks in encounter order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSheet {
    /// Audio file named by the FILE line (informational only)
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<String>,
    pub tracks: Vec<CueTrack>,
}

/// Turn a validated (sorted) track list into rows ready for insertion
///
/// Each track's duration runs up to the next track's start; the last
/// track's duration is unknown because the sheet does not carry the
/// recording length.
pub fn track_rows(validated: &[CueTrack]) -> Vec<NewTrack> {
    validated
        .iter()
        .enumerate()
        .map(|(i, track)| NewTrack {
            track_number: track.track_number,
            title: track.title.clone(),
            performer: track.performer.clone(),
            start_ms: track.start_ms,
            duration_ms: validated.get(i + 1).map(|next| next.start_ms - track.start_ms),
        })
        .collect()
}
