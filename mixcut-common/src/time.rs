//! Timestamp and CUE frame utilities

use chrono::{DateTime, Utc};

/// CUE sheets subdivide a second into 75 frames
pub const FRAMES_PER_SECOND: u32 = 75;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp as stored in the record tables
pub fn now_rfc3339() -> String {
    now().to_rfc3339()
}

/// Convert a CUE `mm:ss:ff` position to milliseconds
///
/// Frames are rounded to the nearest millisecond.
pub fn frames_to_ms(minutes: u32, seconds: u32, frames: u32) -> i64 {
    let whole = (i64::from(minutes) * 60 + i64::from(seconds)) * 1000;
    let frac = (f64::from(frames) * (1000.0 / f64::from(FRAMES_PER_SECOND))).round() as i64;
    whole + frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01, before 2100-01-01
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_now_rfc3339_round_trips() {
        let stamp = now_rfc3339();
        assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_frames_to_ms_zero() {
        assert_eq!(frames_to_ms(0, 0, 0), 0);
    }

    #[test]
    fn test_frames_to_ms_one_minute() {
        assert_eq!(frames_to_ms(1, 0, 0), 60_000);
    }

    #[test]
    fn test_frames_to_ms_full_second_of_frames() {
        assert_eq!(frames_to_ms(0, 0, 75), 1000);
    }

    #[test]
    fn test_frames_to_ms_rounds_partial_frames() {
        // 37 frames = 493.33 ms
        assert_eq!(frames_to_ms(0, 1, 37), 1493);
        // 38 frames = 506.67 ms
        assert_eq!(frames_to_ms(0, 0, 38), 507);
    }

    #[test]
    fn test_frames_to_ms_long_mix() {
        // Minutes past 99 appear in long DJ mixes
        assert_eq!(frames_to_ms(120, 30, 0), 7_230_000);
    }
}
