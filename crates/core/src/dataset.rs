use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AlarmLogError, Result};
use crate::timestamp::parse_sortable;

pub const SERIAL_COLUMN: &str = "serial";
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const ALARM_COLUMN: &str = "alarm";

/// Columns every alarm log must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = [SERIAL_COLUMN, TIMESTAMP_COLUMN, ALARM_COLUMN];

/// In-memory table of text cells, as read from a CSV or Parquet source.
///
/// Cells stay textual so that a dataset can be written back unchanged;
/// typed views are produced on demand by [`Dataset::alarm_records`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset, padding or truncating rows to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the cells of one column; `None` when the column is absent.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Required columns absent from the header, in the order given.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Fail with a schema error naming every missing column.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AlarmLogError::Schema { missing })
        }
    }

    /// Positions of `required` in the header, or a schema error naming every
    /// missing column.
    pub fn column_indices<const N: usize>(&self, required: [&str; N]) -> Result<[usize; N]> {
        self.require_columns(&required)?;
        Ok(required.map(|name| self.column_index(name).unwrap_or_default()))
    }

    /// Overwrite one cell. Out-of-range positions are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// Write the dataset as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Typed alarm records, dropping rows whose timestamp, alarm code or
    /// serial cannot be interpreted.
    ///
    /// Dropped rows are counted and logged, never fatal here; callers decide
    /// whether the surviving rows are enough.
    pub fn alarm_records(&self) -> Result<RecordExtraction> {
        let [serial_idx, ts_idx, alarm_idx] = self.column_indices(REQUIRED_COLUMNS)?;

        let mut extraction = RecordExtraction::default();
        for row in &self.rows {
            let Some(timestamp) = parse_sortable(&row[ts_idx]) else {
                extraction.dropped_timestamps += 1;
                continue;
            };
            let alarm = row[alarm_idx].trim().parse::<f64>().ok().filter(|a| a.is_finite());
            let serial = Serial::parse(&row[serial_idx]);
            match (alarm, serial) {
                (Some(alarm_code), Some(machine_serial)) => extraction.records.push(AlarmRecord {
                    machine_serial,
                    timestamp,
                    alarm_code,
                }),
                _ => extraction.dropped_values += 1,
            }
        }

        if extraction.dropped_timestamps > 0 {
            warn!(
                dropped = extraction.dropped_timestamps,
                "Some timestamp values could not be parsed. Dropping those rows."
            );
        }
        if extraction.dropped_values > 0 {
            warn!(
                dropped = extraction.dropped_values,
                "Rows with non-numeric alarm codes or empty serials dropped"
            );
        }
        Ok(extraction)
    }
}

/// Machine identifier. Integer-looking serials compare numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Serial {
    Int(i64),
    Text(String),
}

impl Serial {
    /// Parse a raw cell; empty cells have no serial.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Self::Int(n));
        }
        // Numeric exports often render integer serials as "12.0".
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                return Some(Self::Int(f as i64));
            }
        }
        Some(Self::Text(raw.to_string()))
    }

    /// Interpret a caller-supplied serial with the same typing as `like`.
    pub fn coerce_like(raw: &str, like: &Serial) -> Option<Self> {
        match like {
            Self::Int(_) => match Self::parse(raw)? {
                int @ Self::Int(_) => Some(int),
                Self::Text(_) => None,
            },
            Self::Text(_) => {
                let raw = raw.trim();
                (!raw.is_empty()).then(|| Self::Text(raw.to_string()))
            }
        }
    }
}

impl Ord for Serial {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Int(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One alarm event with a normalized, orderable timestamp (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub machine_serial: Serial,
    pub timestamp: f64,
    pub alarm_code: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordExtraction {
    pub records: Vec<AlarmRecord>,
    pub dropped_timestamps: usize,
    pub dropped_values: usize,
}
