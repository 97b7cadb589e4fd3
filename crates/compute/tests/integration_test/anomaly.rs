use alarmlog_compute::{run_anomaly_detection, AnomalyOutcome, SplitMode};
use alarmlog_core::FailureReason;

use crate::helpers::{alarm_log, alternating_two_machines, temp_dir, write_csv, write_zip};

#[test]
fn alternating_machines_yield_summary_and_two_figures() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "alarms.csv", &alternating_two_machines());

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    let report = match &outcome {
        AnomalyOutcome::Success(report) => report,
        AnomalyOutcome::Failure(f) => panic!("unexpected failure: {}", f.summary),
    };
    assert!(outcome.summary().contains("Machine 1") || outcome.summary().contains("Machine 2"));
    assert_eq!(outcome.figures().len(), 2);
    assert_eq!(report.train_size + report.future_size, 6);
    assert!(report.train_size >= 1 && report.future_size >= 1);
    assert_eq!(report.split_mode, SplitMode::Proportional);
    for fig in outcome.figures() {
        assert!(fig.png_bytes().unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
    }
}

#[test]
fn requested_machine_is_used() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "alarms.csv", &alternating_two_machines());
    let outcome = run_anomaly_detection(&path, 10, 1, Some("2"));
    assert!(outcome.summary().starts_with("Machine 2: "), "{}", outcome.summary());
}

#[test]
fn fewer_rows_than_window_is_not_fatal() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "short.csv", &alarm_log(&["1", "2"], 3, |_, i| i as i64));

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    assert!(!outcome.is_success());
    assert!(outcome.figures().is_empty());
    assert!(outcome.summary().to_lowercase().contains("insufficient data"));
    assert!(outcome.summary().contains("need at least 10 rows, but have 6"));
}

#[test]
fn missing_machine_lists_available_serials() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "alarms.csv", &alternating_two_machines());

    let outcome = run_anomaly_detection(&path, 10, 1, Some("99"));
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.reason, FailureReason::MachineNotFound);
    assert!(failure.summary.contains("Available: 1, 2"), "{}", failure.summary);
    assert!(outcome.figures().is_empty());
}

#[test]
fn missing_columns_are_reported() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "bad.csv", "serial,when,code\n1,00:01,3\n");

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    assert_eq!(outcome.failure().unwrap().reason, FailureReason::Schema);
    assert_eq!(outcome.summary(), "Error: Missing required columns: timestamp, alarm");
}

#[test]
fn unparseable_timestamps_are_dropped_until_nothing_is_left() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "garbage.csv", "serial,timestamp,alarm\n1,soon,3\n1,later,4\n");

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    assert_eq!(outcome.failure().unwrap().reason, FailureReason::DataInsufficiency);
}

#[test]
fn oversized_offset_row_is_dropped_not_fatal() {
    let dir = temp_dir();
    let mut body = alternating_two_machines();
    body.push_str("1,9999999999999999999:00:00,3\n");
    let path = write_csv(dir.path(), "oversized.csv", &body);

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    let AnomalyOutcome::Success(report) = &outcome else {
        panic!("unexpected failure: {}", outcome.summary());
    };
    assert_eq!(report.train_size + report.future_size, 6);
}

#[test]
fn archive_input_is_accepted() {
    let dir = temp_dir();
    let body = alternating_two_machines();
    let path = write_zip(dir.path(), "bundle.zip", &[("README.txt", "notes"), ("data/alarms.csv", body.as_str())]);

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    assert!(outcome.is_success(), "{}", outcome.summary());
}

#[test]
fn unsupported_extension_is_a_load_failure() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "alarms.txt", &alternating_two_machines());

    let outcome = run_anomaly_detection(&path, 10, 1, None);
    assert_eq!(outcome.failure().unwrap().reason, FailureReason::Load);
}

#[test]
fn outcome_serializes_with_status_tag() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "alarms.csv", &alternating_two_machines());

    let json = serde_json::to_value(run_anomaly_detection(&path, 10, 1, None)).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["machine_serial"], 1);
    assert_eq!(json["split_mode"], "proportional");
    assert_eq!(json["figures"].as_array().unwrap().len(), 2);
}
