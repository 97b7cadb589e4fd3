use std::path::PathBuf;

use clap::{Parser, Subcommand};

use alarmlog_compute::SyntheticTask;

/// Alarm-log analytics: anomaly detection, volume forecasting and synthetic
/// dataset generation.
///
/// Engine defaults come from the environment (and `.env`); flags override
/// them for a single run. Results are printed to stdout as JSON.
#[derive(Parser, Debug)]
#[command(name = "alarmlog", version, about = "Alarm-log anomaly detection and forecasting")]
pub struct CliArgs {
    /// Configuration profile; keys resolve as {PROFILE}_{KEY} before {KEY}
    #[arg(long, global = true, env = "ALARMLOG_PROFILE")]
    pub profile: Option<String>,

    /// Decode result figures into PNG files under this directory
    #[arg(long, global = true)]
    pub figures_dir: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flag anomalous alarm windows for one machine
    Anomaly {
        /// CSV, Parquet or ZIP file with serial, timestamp and alarm columns
        path: PathBuf,

        #[arg(long)]
        window_size: Option<usize>,

        #[arg(long)]
        forecast_horizon: Option<usize>,

        /// Machine to analyse (default: first machine with enough history)
        #[arg(long)]
        machine_serial: Option<String>,

        /// Skip the error-curve and latent-space figures
        #[arg(long)]
        no_figures: bool,
    },

    /// Forecast daily alarm counts
    Forecast {
        path: PathBuf,

        /// Days to forecast
        #[arg(long)]
        steps: Option<usize>,

        /// Skip the Holt-Winters secondary forecast
        #[arg(long)]
        no_secondary: bool,
    },

    /// Write a synthetic variant of a dataset
    Synthetic {
        path: PathBuf,

        /// anomaly or series
        #[arg(long)]
        task: SyntheticTask,

        /// Share of rows to overwrite with the sentinel (anomaly task)
        #[arg(long)]
        anomaly_pct: Option<f64>,

        /// Noise scale as a fraction of the series' standard deviation
        #[arg(long, default_value_t = 0.1)]
        series_noise: f64,

        /// Output file (default: SYNTHETIC_OUTPUT or synthetic_alarms.csv)
        #[arg(long)]
        output: Option<PathBuf>,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anomaly_flags() {
        let args = CliArgs::try_parse_from([
            "alarmlog",
            "anomaly",
            "alarms.csv",
            "--window-size",
            "12",
            "--machine-serial",
            "A7",
            "--pretty",
        ])
        .unwrap();
        assert!(args.pretty);
        match args.command {
            Command::Anomaly {
                path,
                window_size,
                forecast_horizon,
                machine_serial,
                no_figures,
            } => {
                assert_eq!(path, PathBuf::from("alarms.csv"));
                assert_eq!(window_size, Some(12));
                assert_eq!(forecast_horizon, None);
                assert_eq!(machine_serial.as_deref(), Some("A7"));
                assert!(!no_figures);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn synthetic_task_is_validated() {
        let ok = CliArgs::try_parse_from(["alarmlog", "synthetic", "in.csv", "--task", "series"]).unwrap();
        match ok.command {
            Command::Synthetic { task, series_noise, .. } => {
                assert_eq!(task, SyntheticTask::Series);
                assert_eq!(series_noise, 0.1);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(CliArgs::try_parse_from(["alarmlog", "synthetic", "in.csv", "--task", "other"]).is_err());
    }
}
