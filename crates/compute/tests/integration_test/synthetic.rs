use alarmlog_compute::{generate_synthetic_data, SyntheticDataGenerator, SyntheticTask};
use alarmlog_core::config::SyntheticConfig;
use alarmlog_core::{load_dataset, AlarmLogError};

use crate::helpers::{alarm_log, daily_log, temp_dir, weekly_pattern, write_csv};

fn generator(output: std::path::PathBuf) -> SyntheticDataGenerator {
    SyntheticDataGenerator::new(SyntheticConfig {
        output_path: output,
        seed: Some(42),
        ..SyntheticConfig::default()
    })
}

#[test]
fn anomaly_task_marks_exactly_ten_percent() {
    let dir = temp_dir();
    let input = write_csv(dir.path(), "in.csv", &alarm_log(&["5"], 100, |_, i| (i % 9 + 1) as i64));
    let output = dir.path().join("out.csv");

    let written = generator(output.clone())
        .generate(&input, SyntheticTask::Anomaly, Some(0.1), 0.1)
        .unwrap();
    assert_eq!(written, output);

    let original = load_dataset(&input).unwrap();
    let synthetic = load_dataset(&written).unwrap();
    assert_eq!(synthetic.columns(), original.columns());
    assert_eq!(synthetic.len(), 100);

    let mut sentinels = 0;
    for (orig, syn) in original.rows().iter().zip(synthetic.rows()) {
        assert_eq!(orig[..2], syn[..2]);
        if syn[2] == "-1" {
            sentinels += 1;
        } else {
            assert_eq!(orig[2], syn[2]);
        }
    }
    assert_eq!(sentinels, 10);
}

#[test]
fn missing_anomaly_pct_is_a_configuration_error() {
    let dir = temp_dir();
    let input = write_csv(dir.path(), "in.csv", &alarm_log(&["5"], 10, |_, i| i as i64));

    let err = generate_synthetic_data(&input, "anomaly", None, 0.1).unwrap_err();
    assert!(matches!(err, AlarmLogError::Configuration(_)), "{err}");
}

#[test]
fn unknown_task_is_a_configuration_error() {
    let dir = temp_dir();
    let input = write_csv(dir.path(), "in.csv", &alarm_log(&["5"], 10, |_, i| i as i64));

    let err = generate_synthetic_data(&input, "shuffle", Some(0.1), 0.1).unwrap_err();
    assert!(matches!(err, AlarmLogError::Configuration(_)));
}

#[test]
fn series_task_writes_daily_counts() {
    let dir = temp_dir();
    let input = write_csv(dir.path(), "in.csv", &daily_log(21, weekly_pattern));
    let output = dir.path().join("series.csv");

    let written = generator(output)
        .generate(&input, SyntheticTask::Series, None, 0.2)
        .unwrap();
    let series = load_dataset(&written).unwrap();
    assert_eq!(series.columns(), ["timestamp", "alarm"]);
    assert_eq!(series.len(), 21);
    assert_eq!(series.rows()[0][0], "2024-01-01");
    assert!(series.rows().iter().all(|r| r[1].parse::<i64>().is_ok()));
}

#[test]
fn synthetic_anomalies_feed_back_into_detection() {
    let dir = temp_dir();
    let input = write_csv(dir.path(), "in.csv", &alarm_log(&["1"], 40, |_, i| (i % 4) as i64));
    let output = dir.path().join("injected.csv");

    let written = generator(output)
        .generate(&input, SyntheticTask::Anomaly, Some(0.2), 0.1)
        .unwrap();
    let outcome = alarmlog_compute::run_anomaly_detection(&written, 10, 1, Some("1"));
    assert!(outcome.is_success(), "{}", outcome.summary());
}
