//! Consecutive-duplicate pruning of per-machine alarm streams.
//!
//! A run of identical alarm codes on one machine is one logical event; only
//! the first record of each run is kept.

use std::collections::BTreeMap;

use tracing::debug;

use alarmlog_core::{AlarmRecord, Serial};

/// Alarm records grouped by machine, ordered by timestamp, with no two
/// adjacent records sharing an alarm code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrunedLog {
    machines: BTreeMap<Serial, Vec<AlarmRecord>>,
}

impl PrunedLog {
    pub fn machines(&self) -> &BTreeMap<Serial, Vec<AlarmRecord>> {
        &self.machines
    }

    /// Alarm codes of one machine, in temporal order.
    pub fn codes(&self, serial: &Serial) -> Vec<f64> {
        self.machines
            .get(serial)
            .map(|records| records.iter().map(|r| r.alarm_code).collect())
            .unwrap_or_default()
    }

    /// Total records kept across all machines.
    pub fn len(&self) -> usize {
        self.machines.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Flatten back into records ordered by (serial, timestamp).
    pub fn into_records(self) -> Vec<AlarmRecord> {
        self.machines.into_values().flatten().collect()
    }
}

/// Stable-sort by (serial, timestamp) and drop consecutive repeats per machine.
pub fn prune_alarm_logs(records: &[AlarmRecord]) -> PrunedLog {
    let mut sorted: Vec<&AlarmRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.machine_serial
            .cmp(&b.machine_serial)
            .then(a.timestamp.total_cmp(&b.timestamp))
    });

    let mut machines: BTreeMap<Serial, Vec<AlarmRecord>> = BTreeMap::new();
    for record in sorted {
        let kept = machines.entry(record.machine_serial.clone()).or_default();
        if kept.last().map_or(true, |prev| prev.alarm_code != record.alarm_code) {
            kept.push(record.clone());
        }
    }

    let pruned = PrunedLog { machines };
    debug!(
        original = records.len(),
        pruned = pruned.len(),
        machines = pruned.machines.len(),
        "pruned consecutive duplicate alarms"
    );
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(serial: i64, ts: f64, code: f64) -> AlarmRecord {
        AlarmRecord {
            machine_serial: Serial::Int(serial),
            timestamp: ts,
            alarm_code: code,
        }
    }

    fn no_adjacent_repeats(log: &PrunedLog) -> bool {
        log.machines()
            .values()
            .all(|recs| recs.windows(2).all(|w| w[0].alarm_code != w[1].alarm_code))
    }

    #[test]
    fn collapses_runs_per_machine() {
        let records = vec![
            rec(1, 1.0, 5.0),
            rec(1, 2.0, 5.0),
            rec(1, 3.0, 6.0),
            rec(1, 4.0, 5.0),
            rec(2, 1.0, 5.0),
            rec(2, 2.0, 5.0),
        ];
        let log = prune_alarm_logs(&records);
        assert_eq!(log.codes(&Serial::Int(1)), vec![5.0, 6.0, 5.0]);
        assert_eq!(log.codes(&Serial::Int(2)), vec![5.0]);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn sorts_by_timestamp_before_pruning() {
        let records = vec![rec(1, 3.0, 7.0), rec(1, 1.0, 7.0), rec(1, 2.0, 8.0)];
        let log = prune_alarm_logs(&records);
        // Sorted: 7 (t1), 8 (t2), 7 (t3) -> nothing collapses.
        assert_eq!(log.codes(&Serial::Int(1)), vec![7.0, 8.0, 7.0]);
    }

    #[test]
    fn first_record_of_each_machine_is_kept() {
        // Machine 2 starts with the code machine 1 ended on.
        let records = vec![rec(1, 1.0, 4.0), rec(2, 1.0, 4.0)];
        let log = prune_alarm_logs(&records);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn pruning_is_idempotent() {
        let records: Vec<AlarmRecord> = (0..60)
            .map(|i| rec(i % 3, i as f64, ((i / 2) % 4) as f64))
            .collect();
        let once = prune_alarm_logs(&records);
        assert!(no_adjacent_repeats(&once));
        let twice = prune_alarm_logs(&once.clone().into_records());
        assert_eq!(once, twice);
    }

    #[test]
    fn alternating_codes_survive_untouched() {
        let records: Vec<AlarmRecord> = (0..15).map(|i| rec(1, i as f64, (i % 2) as f64)).collect();
        let log = prune_alarm_logs(&records);
        assert_eq!(log.len(), 15);
    }

    #[test]
    fn empty_input() {
        let log = prune_alarm_logs(&[]);
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
