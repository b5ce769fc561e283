//! Best-effort CUE sheet parser
//!
//! Recognized directives (keywords are case-insensitive):
//! - `FILE "name" TYPE`
//! - `TRACK nn AUDIO`
//! - `TITLE "text"` / `PERFORMER "text"` (disc-level before the first TRACK,
//!   track-level after it)
//! - `INDEX 01 mm:ss:ff`
//! - `REM GENRE value` / `REM DATE value`
//!
//! Anything else (CATALOG, ISRC, FLAGS, other REM lines, garbage) is skipped.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CueSheet, CueTrack};
use crate::time::frames_to_ms;

static FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^FILE\s+"(.+?)"\s+(\S+)$"#).expect("FILE pattern"));
static TRACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^TRACK\s+(\d+)\s+(\w+)").expect("TRACK pattern"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^TITLE\s+"(.+?)"$"#).expect("TITLE pattern"));
static PERFORMER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^PERFORMER\s+"(.+?)"$"#).expect("PERFORMER pattern"));
static INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^INDEX\s+(\d+)\s+(\d+):(\d{1,2}):(\d{1,2})$").expect("INDEX pattern")
});
static REMARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^REM\s+(GENRE|DATE)\s+(.+)$").expect("REM pattern"));

/// One recognized line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    File(String),
    Track(u32),
    Title(String),
    Performer(String),
    /// INDEX 01 position in milliseconds
    Start(i64),
    Genre(String),
    Date(String),
}

impl Directive {
    fn parse(line: &str) -> Option<Directive> {
        if let Some(caps) = FILE_RE.captures(line) {
            return Some(Directive::File(caps[1].to_string()));
        }
        if let Some(caps) = TRACK_RE.captures(line) {
            // Every TRACK line closes the previous track. Numbers too large
            // for u32 become 0, which the validator rejects.
            return Some(Directive::Track(caps[1].parse().unwrap_or(0)));
        }
        if let Some(caps) = TITLE_RE.captures(line) {
            return Some(Directive::Title(caps[1].to_string()));
        }
        if let Some(caps) = PERFORMER_RE.captures(line) {
            return Some(Directive::Performer(caps[1].to_string()));
        }
        if let Some(caps) = INDEX_RE.captures(line) {
            let index: u32 = caps[1].parse().ok()?;
            if index != 1 {
                return None;
            }
            let minutes = caps[2].parse().ok()?;
            let seconds = caps[3].parse().ok()?;
            let frames = caps[4].parse().ok()?;
            return Some(Directive::Start(frames_to_ms(minutes, seconds, frames)));
        }
        parse_remark(line)
    }
}

fn parse_remark(line: &str) -> Option<Directive> {
    let caps = REMARK_RE.captures(line)?;
    let value = unquote(&caps[2]);
    if value.is_empty() {
        return None;
    }
    if caps[1].eq_ignore_ascii_case("GENRE") {
        Some(Directive::Genre(value))
    } else {
        Some(Directive::Date(value))
    }
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .trim()
        .to_string()
}

/// Track under construction between two TRACK lines
#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackBuilder {
    number: u32,
    title: Option<String>,
    performer: Option<String>,
    start_ms: Option<i64>,
}

impl TrackBuilder {
    fn new(number: u32) -> Self {
        Self {
            number,
            title: None,
            performer: None,
            start_ms: None,
        }
    }

    fn with_title(self, title: String) -> Self {
        Self {
            title: Some(title),
            ..self
        }
    }

    fn with_performer(self, performer: String) -> Self {
        Self {
            performer: Some(performer),
            ..self
        }
    }

    fn with_start(self, start_ms: i64) -> Self {
        Self {
            start_ms: Some(start_ms),
            ..self
        }
    }

    /// Complete tracks need a title and a start offset; performer is optional
    fn finish(self) -> Option<CueTrack> {
        Some(CueTrack {
            track_number: self.number,
            title: self.title?,
            performer: self.performer,
            start_ms: self.start_ms?,
        })
    }
}

/// Where TITLE and PERFORMER lines land
#[derive(Debug)]
enum Context {
    Disc,
    Track(TrackBuilder),
}

/// Parse CUE sheet text
///
/// Never fails: lines that are not understood are ignored and incomplete
/// track entries are dropped, yielding as much as the sheet allows.
pub fn parse(text: &str) -> CueSheet {
    let mut sheet = CueSheet::default();
    let mut context = Context::Disc;

    for line in lines(text) {
        let Some(directive) = Directive::parse(line) else {
            continue;
        };

        context = match (directive, context) {
            (Directive::Track(number), previous) => {
                if let Context::Track(builder) = previous {
                    sheet.tracks.extend(builder.finish());
                }
                Context::Track(TrackBuilder::new(number))
            }
            (Directive::Title(title), Context::Disc) => {
                sheet.title = Some(title);
                Context::Disc
            }
            (Directive::Title(title), Context::Track(builder)) => {
                Context::Track(builder.with_title(title))
            }
            (Directive::Performer(performer), Context::Disc) => {
                sheet.performer = Some(performer);
                Context::Disc
            }
            (Directive::Performer(performer), Context::Track(builder)) => {
                Context::Track(builder.with_performer(performer))
            }
            (Directive::Start(start_ms), Context::Track(builder)) => {
                Context::Track(builder.with_start(start_ms))
            }
            // INDEX outside of a track has nothing to attach to
            (Directive::Start(_), Context::Disc) => Context::Disc,
            (Directive::File(name), context) => {
                sheet.file_name.get_or_insert(name);
                context
            }
            (Directive::Genre(genre), context) => {
                sheet.genre.get_or_insert(genre);
                context
            }
            (Directive::Date(date), context) => {
                sheet.release_year.get_or_insert(date);
                context
            }
        };
    }

    if let Context::Track(builder) = context {
        sheet.tracks.extend(builder.finish());
    }

    sheet
}

/// Disc-level tags applied to every output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMetadata {
    pub genre: Option<String>,
    pub release_year: Option<String>,
}

/// Scan raw sheet text for the genre and date remarks only
pub fn read_sheet_metadata(text: &str) -> SheetMetadata {
    let mut metadata = SheetMetadata::default();
    for line in lines(text) {
        match parse_remark(line) {
            Some(Directive::Genre(genre)) => {
                metadata.genre.get_or_insert(genre);
            }
            Some(Directive::Date(date)) => {
                metadata.release_year.get_or_insert(date);
            }
            _ => {}
        }
    }
    metadata
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIX: &str = r#"REM GENRE "Deep House"
REM DATE 2024
PERFORMER "Various Artists"
TITLE "Sunset Mix"
FILE "source.m4a" MP4
  TRACK 01 AUDIO
    TITLE "Opening"
    PERFORMER "Artist A"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Second"
    INDEX 00 02:58:00
    INDEX 01 03:00:00
"#;

    #[test]
    fn test_parse_full_sheet() {
        let sheet = parse(MIX);
        assert_eq!(sheet.title.as_deref(), Some("Sunset Mix"));
        assert_eq!(sheet.performer.as_deref(), Some("Various Artists"));
        assert_eq!(sheet.genre.as_deref(), Some("Deep House"));
        assert_eq!(sheet.release_year.as_deref(), Some("2024"));
        assert_eq!(sheet.file_name.as_deref(), Some("source.m4a"));

        assert_eq!(sheet.tracks.len(), 2);
        assert_eq!(sheet.tracks[0].track_number, 1);
        assert_eq!(sheet.tracks[0].title, "Opening");
        assert_eq!(sheet.tracks[0].performer.as_deref(), Some("Artist A"));
        assert_eq!(sheet.tracks[0].start_ms, 0);
        assert_eq!(sheet.tracks[1].performer, None);
        // INDEX 00 ignored, INDEX 01 wins
        assert_eq!(sheet.tracks[1].start_ms, 180_000);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let sheet = parse("track 1 audio\ntitle \"a\"\nindex 01 00:01:00\n");
        assert_eq!(sheet.tracks.len(), 1);
        assert_eq!(sheet.tracks[0].start_ms, 1000);
    }

    #[test]
    fn test_incomplete_tracks_dropped() {
        let text = "TRACK 01 AUDIO\nINDEX 01 00:00:00\nTRACK 02 AUDIO\nTITLE \"No start\"\n";
        assert!(parse(text).tracks.is_empty());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let sheet = parse("hello\nCATALOG 123\nISRC X\n\n\nTRACK abc AUDIO\n");
        assert_eq!(sheet, CueSheet::default());
    }

    #[test]
    fn test_crlf_and_bom() {
        let text = "\u{feff}TRACK 01 AUDIO\r\n  TITLE \"One\"\r\n  INDEX 01 01:00:00\r\n";
        let sheet = parse(text);
        assert_eq!(sheet.tracks.len(), 1);
        assert_eq!(sheet.tracks[0].start_ms, 60_000);
    }

    #[test]
    fn test_tracks_kept_in_encounter_order() {
        let text = "TRACK 02 AUDIO\nTITLE \"b\"\nINDEX 01 05:00:00\n\
                    TRACK 01 AUDIO\nTITLE \"a\"\nINDEX 01 00:00:00\n";
        let numbers: Vec<u32> = parse(text).tracks.iter().map(|t| t.track_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn test_remark_values_quoted_or_bare() {
        let metadata = read_sheet_metadata("REM GENRE Techno\nREM DATE \"1999\"\nREM COMMENT x\n");
        assert_eq!(metadata.genre.as_deref(), Some("Techno"));
        assert_eq!(metadata.release_year.as_deref(), Some("1999"));
    }

    #[test]
    fn test_read_sheet_metadata_absent() {
        assert_eq!(read_sheet_metadata(MIX.replace("REM", "XX").as_str()), SheetMetadata::default());
    }

    #[test]
    fn test_oversized_track_number_still_closes_previous_track() {
        let text = "TRACK 01 AUDIO\nTITLE \"Opening\"\nINDEX 01 00:00:00\n\
                    TRACK 4294967296 AUDIO\nTITLE \"Closer\"\nINDEX 01 03:00:00\n";
        let sheet = parse(text);
        assert_eq!(sheet.tracks.len(), 2);
        assert_eq!(sheet.tracks[0].title, "Opening");
        assert_eq!(sheet.tracks[0].start_ms, 0);
        assert_eq!(sheet.tracks[1].track_number, 0);
        assert_eq!(sheet.tracks[1].title, "Closer");
        assert_eq!(
            crate::cue::validate(&sheet),
            Err(crate::cue::ValidationError::InvalidTrackNumber(0))
        );
    }

    #[test]
    fn test_empty_title_is_not_a_title() {
        let text = "TITLE \"\"\nTRACK 01 AUDIO\nTITLE \"\"\nPERFORMER \"\"\nINDEX 01 00:00:00\n\
                    TRACK 02 AUDIO\nTITLE \"Kept\"\nINDEX 01 01:00:00\n";
        let sheet = parse(text);
        assert_eq!(sheet.title, None);
        assert_eq!(sheet.tracks.len(), 1);
        assert_eq!(sheet.tracks[0].track_number, 2);
    }

    #[test]
    fn test_builder_finish_requires_title_and_start() {
        assert!(TrackBuilder::new(1).with_start(0).finish().is_none());
        assert!(TrackBuilder::new(1).with_title("t".into()).finish().is_none());
        let track = TrackBuilder::new(3)
            .with_title("t".into())
            .with_start(10)
            .finish()
            .unwrap();
        assert_eq!(track.track_number, 3);
        assert_eq!(track.performer, None);
    }
}
