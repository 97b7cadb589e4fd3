use alarmlog_compute::{run_forecasting, ForecastOutcome};
use alarmlog_core::FailureReason;

use crate::helpers::{daily_log, temp_dir, weekly_pattern, write_csv};

#[test]
fn sixty_days_forecast_thirty_entries() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "daily.csv", &daily_log(60, weekly_pattern));

    let outcome = run_forecasting(&path, 30);
    let report = match &outcome {
        ForecastOutcome::Success(report) => report,
        ForecastOutcome::Failure(f) => panic!("unexpected failure: {}", f.summary),
    };
    assert_eq!(report.forecast.len(), 30);
    assert!(outcome.figures().len() >= 2);
    assert_eq!(report.observations, 60);
}

#[test]
fn forecast_serializes_dates_as_keys() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "daily.csv", &daily_log(63, weekly_pattern));

    let json = serde_json::to_value(run_forecasting(&path, 5)).unwrap();
    assert_eq!(json["status"], "success");
    let forecast = json["forecast"].as_object().unwrap();
    assert_eq!(forecast.len(), 5);
    assert!(forecast.contains_key("2024-03-04"));
    assert!(forecast.contains_key("2024-03-08"));
}

#[test]
fn short_history_is_not_fatal() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "daily.csv", &daily_log(10, weekly_pattern));

    let outcome = run_forecasting(&path, 30);
    assert_eq!(outcome.failure().unwrap().reason, FailureReason::DataInsufficiency);
    assert!(outcome.figures().is_empty());
}

#[test]
fn offset_only_timestamps_cannot_be_forecast() {
    let dir = temp_dir();
    let path = write_csv(dir.path(), "offsets.csv", "serial,timestamp,alarm\n1,00:00:01,3\n1,00:00:02,4\n");

    let outcome = run_forecasting(&path, 30);
    assert_eq!(outcome.failure().unwrap().reason, FailureReason::DataInsufficiency);
}
