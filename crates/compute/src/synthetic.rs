//! Synthetic dataset variants for exercising the engines.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use alarmlog_core::config::SyntheticConfig;
use alarmlog_core::{load_dataset, AlarmLogError, Dataset, EngineConfig, Result, ALARM_COLUMN, TIMESTAMP_COLUMN};

use crate::algorithms::stats::std_dev;
use crate::pipeline::daily_counts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticTask {
    /// Overwrite a random share of alarm codes with the sentinel.
    Anomaly,
    /// Noisy copy of the daily alarm-count series.
    Series,
}

impl FromStr for SyntheticTask {
    type Err = AlarmLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anomaly" => Ok(Self::Anomaly),
            "series" => Ok(Self::Series),
            other => Err(AlarmLogError::Configuration(format!(
                "unknown synthetic task '{other}', expected 'anomaly' or 'series'"
            ))),
        }
    }
}

impl fmt::Display for SyntheticTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anomaly => f.write_str("anomaly"),
            Self::Series => f.write_str("series"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticDataGenerator {
    config: SyntheticConfig,
}

impl SyntheticDataGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.synthetic.clone())
    }

    pub fn output_path(&self) -> &Path {
        &self.config.output_path
    }

    /// Load `path`, build the variant and write it to the configured output.
    ///
    /// Returns the output path.
    pub fn generate(
        &self,
        path: &Path,
        task: SyntheticTask,
        anomaly_pct: Option<f64>,
        series_noise: f64,
    ) -> Result<PathBuf> {
        let dataset = load_dataset(path)?;
        let synthetic = match task {
            SyntheticTask::Anomaly => {
                let pct = anomaly_pct.ok_or_else(|| {
                    AlarmLogError::Configuration("anomaly_pct is required for the anomaly task".into())
                })?;
                self.inject_anomalies(&dataset, pct)?
            }
            SyntheticTask::Series => self.noisy_series(&dataset, series_noise)?,
        };

        let out = self.config.output_path.clone();
        synthetic.write_csv(&out)?;
        info!(%task, rows = synthetic.len(), output = %out.display(), "synthetic dataset written");
        Ok(out)
    }

    /// Copy of `dataset` with `floor(n * pct)` distinct rows' alarm set to
    /// the sentinel. Every other cell is untouched.
    pub fn inject_anomalies(&self, dataset: &Dataset, pct: f64) -> Result<Dataset> {
        if !(pct > 0.0 && pct <= 1.0) {
            return Err(AlarmLogError::Configuration(format!(
                "anomaly_pct must be in (0, 1], got {pct}"
            )));
        }
        let [alarm_idx] = dataset.column_indices([ALARM_COLUMN])?;

        let n = dataset.len();
        // Small epsilon so that e.g. 100 * 0.1 never floors to 9.
        let k = ((n as f64 * pct + 1e-9).floor() as usize).min(n);
        let mut rng = self.rng();
        let mut out = dataset.clone();
        let sentinel = self.config.sentinel.to_string();
        for row in index::sample(&mut rng, n, k) {
            out.set_cell(row, alarm_idx, sentinel.clone());
        }
        debug!(rows = n, injected = k, "injected synthetic anomalies");
        Ok(out)
    }

    /// Two-column `timestamp,alarm` table of daily counts with Gaussian noise
    /// of `noise` times the series' sample standard deviation, rounded.
    pub fn noisy_series(&self, dataset: &Dataset, noise: f64) -> Result<Dataset> {
        if !(noise.is_finite() && noise >= 0.0) {
            return Err(AlarmLogError::Configuration(format!(
                "series_noise must be a non-negative number, got {noise}"
            )));
        }
        let series = daily_counts(dataset)?;
        let sigma = std_dev(&series.counts, 1) * noise;
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| AlarmLogError::Configuration(format!("invalid noise scale {sigma}: {e}")))?;
        let mut rng = self.rng();

        let rows = series
            .dates()
            .zip(&series.counts)
            .map(|(date, &count)| {
                let value = (count + normal.sample(&mut rng)).round() as i64;
                vec![date.format("%Y-%m-%d").to_string(), value.to_string()]
            })
            .collect();
        debug!(days = series.len(), sigma, "generated noisy daily series");
        Ok(Dataset::new(
            vec![TIMESTAMP_COLUMN.to_string(), ALARM_COLUMN.to_string()],
            rows,
        ))
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Write a synthetic variant of `path` using the default output location.
///
/// `task` is `"anomaly"` or `"series"`; the anomaly task requires
/// `anomaly_pct`.
pub fn generate_synthetic_data(
    path: impl AsRef<Path>,
    task: &str,
    anomaly_pct: Option<f64>,
    series_noise: f64,
) -> Result<PathBuf> {
    let task: SyntheticTask = task.parse()?;
    SyntheticDataGenerator::new(SyntheticConfig::default()).generate(path.as_ref(), task, anomaly_pct, series_noise)
}
