use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (entry, body) in entries {
        zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// `serial,timestamp,alarm` rows: `rows` per machine, offsets in seconds,
/// codes from `code(i)`.
pub fn alarm_log(serials: &[&str], rows: usize, code: impl Fn(&str, usize) -> i64) -> String {
    let mut body = String::from("serial,timestamp,alarm\n");
    for serial in serials {
        for i in 0..rows {
            writeln!(body, "{serial},00:{:02}:{:02},{}", i / 60, i % 60, code(serial, i)).unwrap();
        }
    }
    body
}

/// The two-machine, 15-row, alternating-code fixture.
pub fn alternating_two_machines() -> String {
    alarm_log(&["1", "2"], 15, |_, i| (i % 2) as i64)
}

/// One row per alarm event over `days` consecutive calendar days from
/// 2024-01-01, with `per_day(d)` events on day `d`.
pub fn daily_log(days: usize, per_day: impl Fn(usize) -> usize) -> String {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut body = String::from("serial,timestamp,alarm\n");
    for d in 0..days {
        let date = start.checked_add_days(Days::new(d as u64)).unwrap();
        for i in 0..per_day(d) {
            writeln!(body, "{},{date} {:02}:15:00,{}", i % 2 + 1, i % 24, i % 4).unwrap();
        }
    }
    body
}

pub fn weekly_pattern(d: usize) -> usize {
    [3, 5, 4, 6, 8, 2, 1][d % 7] + d / 15
}
