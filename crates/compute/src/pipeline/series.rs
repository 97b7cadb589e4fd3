//! Daily alarm-count series built from calendar timestamps.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use alarmlog_core::timestamp::parse_calendar;
use alarmlog_core::{AlarmLogError, Dataset, Result, ALARM_COLUMN, TIMESTAMP_COLUMN};

/// Alarm events per calendar day, contiguous from `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub start: NaiveDate,
    pub counts: Vec<f64>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Calendar day of position `index` (may lie past the end).
    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(index as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.counts.len()).map(|i| self.date_at(i))
    }
}

/// Count non-empty alarm cells per calendar day, zero-filling days without
/// events.
///
/// Rows whose timestamp is not a calendar datetime are dropped with a warning;
/// losing every row is a data-insufficiency error.
pub fn daily_counts(dataset: &Dataset) -> Result<DailySeries> {
    let [ts_idx, alarm_idx] = dataset.column_indices([TIMESTAMP_COLUMN, ALARM_COLUMN])?;

    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in dataset.rows() {
        let Some(dt) = parse_calendar(&row[ts_idx]) else {
            dropped += 1;
            continue;
        };
        let count = per_day.entry(dt.date()).or_default();
        if !row[alarm_idx].trim().is_empty() {
            *count += 1;
        }
    }
    if dropped > 0 {
        warn!(dropped, "Some timestamp values could not be parsed. Dropping those rows.");
    }

    let (Some((&start, _)), Some((&end, _))) = (per_day.first_key_value(), per_day.last_key_value()) else {
        return Err(AlarmLogError::DataInsufficiency(format!(
            "no calendar timestamps could be parsed ({dropped} rows dropped)"
        )));
    };

    let days = (end - start).num_days() as usize + 1;
    let mut counts = vec![0.0; days];
    for (day, n) in per_day {
        counts[(day - start).num_days() as usize] = n as f64;
    }
    debug!(%start, %end, days, "aggregated daily alarm counts");
    Ok(DailySeries { start, counts })
}
