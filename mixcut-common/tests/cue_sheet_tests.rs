//! End-to-end tests for CUE sheet parsing followed by validation

use mixcut_common::cue::{parse, track_rows, validate, ValidationError};

const TWO_TRACKS: &str = r#"PERFORMER "Resident"
TITLE "Friday Night"
FILE "source.m4a" MP4
  TRACK 01 AUDIO
    TITLE "First"
    PERFORMER "Artist One"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Second"
    PERFORMER "Artist Two"
    INDEX 01 03:00:00
"#;

#[test]
fn test_two_track_sheet_validates() {
    let tracks = validate(&parse(TWO_TRACKS)).expect("sheet should validate");

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].track_number, 1);
    assert_eq!(tracks[0].start_ms, 0);
    assert_eq!(tracks[1].track_number, 2);
    assert_eq!(tracks[1].start_ms, 180_000);
}

#[test]
fn test_swapped_index_lines_fail_naming_track_one() {
    let swapped = TWO_TRACKS
        .replace("INDEX 01 00:00:00", "INDEX 01 @@")
        .replace("INDEX 01 03:00:00", "INDEX 01 00:00:00")
        .replace("INDEX 01 @@", "INDEX 01 03:00:00");

    let err = validate(&parse(&swapped)).unwrap_err();
    assert_eq!(err, ValidationError::StartNotIncreasing(1));
    assert_eq!(
        err.to_string(),
        "Track 1 starts before or at same time as previous track"
    );
}

#[test]
fn test_track_without_title_is_excluded() {
    let sheet = r#"TRACK 01 AUDIO
  TITLE "One"
  INDEX 01 00:00:00
TRACK 02 AUDIO
  PERFORMER "Nobody"
  INDEX 01 02:00:00
TRACK 03 AUDIO
  TITLE "Three"
  INDEX 01 04:00:00
"#;

    let parsed = parse(sheet);
    assert_eq!(parsed.tracks.len(), 2);

    let tracks = validate(&parsed).unwrap();
    let numbers: Vec<u32> = tracks.iter().map(|t| t.track_number).collect();
    assert_eq!(numbers, vec![1, 3]);
}

#[test]
fn test_empty_sheet_reports_no_tracks() {
    let err = validate(&parse("REM just a comment\n")).unwrap_err();
    assert_eq!(err, ValidationError::NoTracks);
    assert_eq!(err.to_string(), "No tracks found in CUE sheet");
}

#[test]
fn test_duplicate_track_number_named() {
    let sheet = "TRACK 05 AUDIO\nTITLE \"a\"\nINDEX 01 00:00:00\n\
                 TRACK 05 AUDIO\nTITLE \"b\"\nINDEX 01 01:00:00\n";
    let err = validate(&parse(sheet)).unwrap_err();
    assert_eq!(err.to_string(), "Duplicate track number: 5");
}

#[test]
fn test_validation_is_idempotent_on_sorted_output() {
    let first = validate(&parse(TWO_TRACKS)).unwrap();
    let mut reparsed = parse(TWO_TRACKS);
    reparsed.tracks = first.clone();
    assert_eq!(validate(&reparsed).unwrap(), first);
}

#[test]
fn test_frames_in_index_lines() {
    let sheet = "TRACK 01 AUDIO\nTITLE \"a\"\nINDEX 01 00:00:00\n\
                 TRACK 02 AUDIO\nTITLE \"b\"\nINDEX 01 00:01:37\n";
    let tracks = validate(&parse(sheet)).unwrap();
    assert_eq!(tracks[1].start_ms, 1493);

    let rows = track_rows(&tracks);
    assert_eq!(rows[0].duration_ms, Some(1493));
    assert_eq!(rows[1].duration_ms, None);
}
