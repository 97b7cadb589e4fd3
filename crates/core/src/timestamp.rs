//! Timestamp normalization for alarm logs.
//!
//! Alarm exports carry either clock offsets from the start of a recording
//! (`HH:MM:SS`, `MM:SS`, bare seconds) or calendar datetimes. Offsets are
//! normalized to seconds; calendar values to naive UTC datetimes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse `HH:MM:SS(.f)`, `MM:SS(.f)` or bare seconds into seconds.
pub fn parse_offset_seconds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parts: Vec<&str> = raw.split(':').collect();
    let seconds = match parts.as_slice() {
        [h, m, s] => {
            let h: u64 = h.trim().parse().ok()?;
            let m: u64 = m.trim().parse().ok()?;
            let s: f64 = s.trim().parse().ok()?;
            h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)? as f64 + s
        }
        [m, s] => {
            let m: u64 = m.trim().parse().ok()?;
            let s: f64 = s.trim().parse().ok()?;
            m.checked_mul(60)? as f64 + s
        }
        [s] => s.parse().ok()?,
        _ => return None,
    };
    seconds.is_finite().then_some(seconds)
}

/// Parse a calendar datetime in any of the supported layouts.
pub fn parse_calendar(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Normalize a raw timestamp to an orderable number of seconds: clock
/// offsets first, calendar datetimes as epoch seconds otherwise.
pub fn parse_sortable(raw: &str) -> Option<f64> {
    parse_offset_seconds(raw).or_else(|| parse_calendar(raw).map(epoch_seconds))
}

fn epoch_seconds(dt: NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_millis()) / 1000.0
}
