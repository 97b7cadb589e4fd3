//! Reconstruction-based anomaly detection over one machine's alarm windows.
//!
//! A run walks LOAD, VALIDATE, BUILD_SEQUENCES, SELECT_MACHINE, SPLIT, TRAIN,
//! SCORE and THRESHOLD, then optionally clusters and renders. Every failing
//! stage ends the run with an [`AnomalyOutcome::Failure`]; rendering problems
//! only drop the affected figure.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use alarmlog_core::config::{AnomalyConfig, RenderConfig};
use alarmlog_core::{
    load_dataset, AlarmLogError, Dataset, EngineConfig, Result, Serial,
    REQUIRED_COLUMNS,
};

use crate::algorithms::autoencoder::{to_matrix, Autoencoder, TrainOptions};
use crate::algorithms::kmeans::{kmeans, silhouette_score};
use crate::algorithms::stats::quantile;
use crate::algorithms::tsne::{stride_indices, tsne, TsneOptions};
use crate::outcome::{AnomalyOutcome, Figure};
use crate::pipeline::{build_all, prune_alarm_logs, MachineSequences, RunMetrics, WindowSpec};
use crate::render::Renderer;

const KMEANS_MAX_ITERATIONS: usize = 300;

/// How a machine's windows were partitioned into train and future sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Leading `train_fraction` of the windows train, the rest are scored.
    Proportional,
    /// All but the last window train; the last one is scored.
    HoldLastOut,
    /// A single window used as both partitions.
    Duplicated,
}

/// Index ranges into a machine's windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub train: Range<usize>,
    pub future: Range<usize>,
    pub mode: SplitMode,
}

/// Partition `n` windows by order, never shuffling.
///
/// The training share is `floor(train_fraction * n)` with a floor of one.
/// When that leaves the future set empty, the last window is held out; a lone
/// window is duplicated only if `allow_duplicate` is set.
pub fn split_sequences(n: usize, train_fraction: f64, allow_duplicate: bool) -> Result<SplitPlan> {
    if n == 0 {
        return Err(AlarmLogError::DataInsufficiency("no sequences to split".into()));
    }
    let train = ((train_fraction * n as f64).floor() as usize).clamp(1, n);
    if train < n {
        return Ok(SplitPlan {
            train: 0..train,
            future: train..n,
            mode: SplitMode::Proportional,
        });
    }
    if n >= 2 {
        return Ok(SplitPlan {
            train: 0..n - 1,
            future: n - 1..n,
            mode: SplitMode::HoldLastOut,
        });
    }
    if allow_duplicate {
        return Ok(SplitPlan {
            train: 0..1,
            future: 0..1,
            mode: SplitMode::Duplicated,
        });
    }
    Err(AlarmLogError::DataInsufficiency(
        "only one sequence available, cannot form separate train and future sets".into(),
    ))
}

/// One anomaly-detection invocation. Unset fields fall back to the engine's
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct AnomalyRequest {
    pub path: PathBuf,
    pub window_size: Option<usize>,
    pub forecast_horizon: Option<usize>,
    pub machine_serial: Option<String>,
}

impl AnomalyRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn with_forecast_horizon(mut self, forecast_horizon: usize) -> Self {
        self.forecast_horizon = Some(forecast_horizon);
        self
    }

    pub fn with_machine_serial(mut self, serial: impl Into<String>) -> Self {
        self.machine_serial = Some(serial.into());
        self
    }
}

/// Successful anomaly-detection result for one machine.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub machine_serial: Serial,
    /// Every machine seen after pruning, in serial order.
    pub available_machines: Vec<Serial>,
    pub window_size: usize,
    pub forecast_horizon: usize,
    pub split_mode: SplitMode,
    pub train_size: usize,
    pub future_size: usize,
    pub threshold_quantile: f64,
    pub threshold: f64,
    pub train_errors: Vec<f64>,
    pub future_errors: Vec<f64>,
    /// `future_errors[i] > threshold`.
    pub anomaly_flags: Vec<bool>,
    pub anomaly_count: usize,
    pub loss_history: Vec<f64>,
    pub final_loss: f64,
    /// Silhouette of the k-means clustering of training latents.
    pub silhouette: Option<f64>,
    pub summary: String,
    pub figures: Vec<Figure>,
    pub metrics: RunMetrics,
}

/// Latent-space clustering of the training windows.
struct LatentClusters {
    latents: Vec<Vec<f64>>,
    assignments: Vec<usize>,
    silhouette: f64,
}

/// Anomaly engine bound to one configuration.
///
/// Holds no state between runs; separate instances may run concurrently.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    config: AnomalyConfig,
    renderer: Option<Renderer>,
}

impl AnomalyEngine {
    pub fn new(config: AnomalyConfig, render: &RenderConfig) -> Self {
        let renderer = config.visualize.then(|| Renderer::new(render));
        Self { config, renderer }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.anomaly.clone(), &config.render)
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Run the full pipeline on the file named by `request`.
    pub fn run(&self, request: &AnomalyRequest) -> AnomalyOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("anomaly_detection", %run_id, path = %request.path.display());
        let _guard = span.enter();

        let outcome = AnomalyOutcome::from(self.execute(request));
        match &outcome {
            AnomalyOutcome::Success(report) => {
                info!(summary = %report.summary, total_ms = report.metrics.total_ms, "anomaly detection completed")
            }
            AnomalyOutcome::Failure(failure) => {
                warn!(reason = ?failure.reason, summary = %failure.summary, "anomaly detection failed")
            }
        }
        outcome
    }

    /// Run detection over an already-loaded dataset.
    pub fn detect(
        &self,
        dataset: &Dataset,
        spec: WindowSpec,
        machine_serial: Option<&str>,
    ) -> Result<AnomalyReport> {
        self.detect_with_metrics(dataset, spec, machine_serial, RunMetrics::start())
    }

    fn execute(&self, request: &AnomalyRequest) -> Result<AnomalyReport> {
        let spec = WindowSpec::new(
            request.window_size.unwrap_or(self.config.window_size),
            request.forecast_horizon.unwrap_or(self.config.forecast_horizon),
        )?;

        let mut metrics = RunMetrics::start();
        let timer = metrics.timer("load");
        let dataset = load_dataset(&request.path)?;
        timer.finish(&mut metrics);
        info!(rows = dataset.len(), columns = dataset.columns().len(), "dataset loaded");

        self.detect_with_metrics(&dataset, spec, request.machine_serial.as_deref(), metrics)
    }

    fn detect_with_metrics(
        &self,
        dataset: &Dataset,
        spec: WindowSpec,
        machine_serial: Option<&str>,
        mut metrics: RunMetrics,
    ) -> Result<AnomalyReport> {
        let width = spec.width();

        let timer = metrics.timer("validate");
        dataset.require_columns(&REQUIRED_COLUMNS)?;
        let extraction = dataset.alarm_records()?;
        let rows = extraction.records.len();
        if rows == 0 {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "no usable rows remain ({} unparseable timestamps, {} invalid alarm or serial values)",
                extraction.dropped_timestamps, extraction.dropped_values
            )));
        }
        if rows < width {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "need at least {width} rows, but have {rows}"
            )));
        }
        timer.finish(&mut metrics);

        info!("Starting preprocessing");
        let timer = metrics.timer("sequences");
        let pruned = prune_alarm_logs(&extraction.records);
        let sequences = build_all(&pruned, spec);
        timer.finish(&mut metrics);
        let total_windows: usize = sequences.values().map(MachineSequences::len).sum();
        info!(
            kept = pruned.len(),
            dropped = rows - pruned.len(),
            machines = sequences.len(),
            windows = total_windows,
            "preprocessing complete"
        );
        if total_windows == 0 {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "no machine has {width} consecutive distinct alarms, so no sequences could be generated"
            )));
        }

        let (serial, machine) = select_machine(&sequences, machine_serial)?;
        let n = machine.len();
        if n < self.config.min_sequences.max(1) {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "machine {serial} needs at least {} sequences, but has {n}",
                self.config.min_sequences
            )));
        }

        let plan = split_sequences(n, self.config.train_fraction, self.config.degenerate_split)?;
        if plan.mode != SplitMode::Proportional {
            warn!(mode = ?plan.mode, sequences = n, "proportional split left a partition empty");
        }
        let train = matrix(&machine.windows[plan.train.clone()])?;
        let future = matrix(&machine.windows[plan.future.clone()])?;
        debug!(train = train.nrows(), future = future.nrows(), width, "split sequences");

        let timer = metrics.timer("train");
        let model = Autoencoder::train(
            &train,
            TrainOptions {
                latent_dim: self.config.latent_dim,
                epochs: self.config.epochs,
                learning_rate: self.config.learning_rate,
                seed: self.config.seed,
            },
        );
        timer.finish(&mut metrics);
        let final_loss = model.loss(&train);
        info!(epochs = self.config.epochs, final_loss, "autoencoder trained");

        let timer = metrics.timer("score");
        let train_errors = model.reconstruction_errors(&train);
        let future_errors = model.reconstruction_errors(&future);
        let threshold = quantile(&train_errors, self.config.threshold_quantile).ok_or_else(|| {
            AlarmLogError::Numeric("no training errors to derive a threshold from".into())
        })?;
        let anomaly_flags: Vec<bool> = future_errors.iter().map(|&e| e > threshold).collect();
        let anomaly_count = anomaly_flags.iter().filter(|&&f| f).count();
        timer.finish(&mut metrics);

        let clusters = if self.config.clusters > 0 {
            let timer = metrics.timer("cluster");
            let latents: Vec<Vec<f64>> = model.encode(&train).rows().into_iter().map(|r| r.to_vec()).collect();
            let k = self.config.clusters.min(latents.len());
            let result = kmeans(&latents, k, KMEANS_MAX_ITERATIONS);
            let silhouette = silhouette_score(&latents, &result);
            timer.finish(&mut metrics);
            debug!(k, silhouette, inertia = result.inertia, "clustered latent space");
            Some(LatentClusters {
                latents,
                assignments: result.assignments,
                silhouette,
            })
        } else {
            None
        };

        let mut figures = Vec::new();
        if let Some(renderer) = &self.renderer {
            let timer = metrics.timer("visualize");
            figures = self.visualize(renderer, &future_errors, threshold, &anomaly_flags, clusters.as_ref());
            timer.finish(&mut metrics);
        }

        let summary = format!(
            "Machine {serial}: {anomaly_count}/{} anomalies (threshold={threshold:.4})",
            future_errors.len()
        );
        metrics.finish();

        Ok(AnomalyReport {
            machine_serial: serial,
            available_machines: sequences.keys().cloned().collect(),
            window_size: width,
            forecast_horizon: spec.horizon(),
            split_mode: plan.mode,
            train_size: plan.train.len(),
            future_size: plan.future.len(),
            threshold_quantile: self.config.threshold_quantile,
            threshold,
            train_errors,
            future_errors,
            anomaly_flags,
            anomaly_count,
            loss_history: model.loss_history().to_vec(),
            final_loss,
            silhouette: clusters.as_ref().map(|c| c.silhouette),
            summary,
            figures,
            metrics,
        })
    }

    /// Error curve plus latent scatter; a figure that fails to render is skipped.
    fn visualize(
        &self,
        renderer: &Renderer,
        future_errors: &[f64],
        threshold: f64,
        flags: &[bool],
        clusters: Option<&LatentClusters>,
    ) -> Vec<Figure> {
        let mut figures = Vec::with_capacity(2);
        match renderer.error_curve(future_errors, threshold, flags) {
            Ok(fig) => figures.push(fig),
            Err(e) => warn!(error = %e, "skipping reconstruction error figure"),
        }

        let Some(clusters) = clusters else {
            return figures;
        };
        let keep = stride_indices(clusters.latents.len(), self.config.tsne_max_points);
        let points: Vec<Vec<f64>> = keep.iter().map(|&i| clusters.latents[i].clone()).collect();
        let labels: Vec<usize> = keep.iter().map(|&i| clusters.assignments[i]).collect();
        let embedding = tsne(
            &points,
            TsneOptions {
                iterations: self.config.tsne_iterations,
                seed: self.config.seed,
                ..TsneOptions::default()
            },
        );
        match renderer.cluster_scatter(&embedding, &labels) {
            Ok(fig) => figures.push(fig),
            Err(e) => warn!(error = %e, "skipping latent space figure"),
        }
        figures
    }
}

/// Pick the requested machine, or the first one with any windows.
fn select_machine<'a>(
    sequences: &'a BTreeMap<Serial, MachineSequences>,
    requested: Option<&str>,
) -> Result<(Serial, &'a MachineSequences)> {
    let Some(raw) = requested else {
        let (serial, machine) = sequences
            .iter()
            .find(|(_, m)| !m.is_empty())
            .ok_or_else(|| AlarmLogError::DataInsufficiency("no machine serials found in data".into()))?;
        info!(machine = %serial, "no machine_serial specified, using first available");
        return Ok((serial.clone(), machine));
    };

    let like = sequences.keys().next();
    let found = like
        .and_then(|like| Serial::coerce_like(raw, like))
        .or_else(|| Serial::parse(raw))
        .and_then(|serial| sequences.get_key_value(&serial));
    match found {
        Some((serial, machine)) => Ok((serial.clone(), machine)),
        None => Err(AlarmLogError::MachineNotFound {
            requested: raw.trim().to_string(),
            available: sequences.keys().map(Serial::to_string).collect(),
        }),
    }
}

fn matrix(windows: &[Vec<f64>]) -> Result<ndarray::Array2<f64>> {
    to_matrix(windows).ok_or_else(|| AlarmLogError::Numeric("windows have inconsistent widths".into()))
}

/// Anomaly detection with default settings.
///
/// Never returns an error: failures come back as
/// [`AnomalyOutcome::Failure`] with a displayable summary.
pub fn run_anomaly_detection(
    path: impl AsRef<Path>,
    window_size: usize,
    forecast_horizon: usize,
    machine_serial: Option<&str>,
) -> AnomalyOutcome {
    let engine = AnomalyEngine::new(AnomalyConfig::default(), &RenderConfig::default());
    let mut request = AnomalyRequest::new(path.as_ref())
        .with_window_size(window_size)
        .with_forecast_horizon(forecast_horizon);
    request.machine_serial = machine_serial.map(str::to_string);
    engine.run(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmlog_core::FailureReason;

    fn rows(serial: &str, count: usize, code: impl Fn(usize) -> usize) -> Vec<Vec<String>> {
        (0..count)
            .map(|i| {
                vec![
                    serial.to_string(),
                    format!("00:{:02}:{:02}", i / 60, i % 60),
                    code(i).to_string(),
                ]
            })
            .collect()
    }

    fn dataset(rows: Vec<Vec<String>>) -> Dataset {
        Dataset::new(vec!["serial".into(), "timestamp".into(), "alarm".into()], rows)
    }

    fn two_machines() -> Dataset {
        let mut all = rows("1", 15, |i| i % 2);
        all.extend(rows("2", 15, |i| (i + 1) % 2));
        dataset(all)
    }

    fn fast_config() -> AnomalyConfig {
        AnomalyConfig {
            tsne_iterations: 100,
            ..AnomalyConfig::default()
        }
    }

    fn engine(config: AnomalyConfig) -> AnomalyEngine {
        AnomalyEngine::new(config, &RenderConfig { width: 160, height: 120 })
    }

    fn spec(w: usize) -> WindowSpec {
        WindowSpec::new(w, 1).unwrap()
    }

    #[test]
    fn split_is_proportional_when_both_sides_nonempty() {
        let plan = split_sequences(6, 0.7, true).unwrap();
        assert_eq!(plan.train, 0..4);
        assert_eq!(plan.future, 4..6);
        assert_eq!(plan.mode, SplitMode::Proportional);

        let plan = split_sequences(10, 0.7, true).unwrap();
        assert_eq!((plan.train.len(), plan.future.len()), (7, 3));
    }

    #[test]
    fn split_holds_out_last_window_when_future_is_empty() {
        let plan = split_sequences(3, 1.0, true).unwrap();
        assert_eq!(plan.train, 0..2);
        assert_eq!(plan.future, 2..3);
        assert_eq!(plan.mode, SplitMode::HoldLastOut);
    }

    #[test]
    fn split_keeps_at_least_one_training_window() {
        let plan = split_sequences(2, 0.1, true).unwrap();
        assert_eq!(plan.train, 0..1);
        assert_eq!(plan.future, 1..2);
        assert_eq!(plan.mode, SplitMode::Proportional);
    }

    #[test]
    fn single_window_duplicates_or_fails() {
        let plan = split_sequences(1, 0.7, true).unwrap();
        assert_eq!(plan.mode, SplitMode::Duplicated);
        assert_eq!(plan.train, plan.future);

        assert!(matches!(
            split_sequences(1, 0.7, false),
            Err(AlarmLogError::DataInsufficiency(_))
        ));
        assert!(split_sequences(0, 0.7, true).is_err());
    }

    #[test]
    fn alternating_machines_produce_report_and_two_figures() {
        let report = engine(fast_config()).detect(&two_machines(), spec(10), None).unwrap();
        assert_eq!(report.machine_serial, Serial::Int(1));
        assert_eq!(report.available_machines, vec![Serial::Int(1), Serial::Int(2)]);
        assert_eq!(report.train_size + report.future_size, 6);
        assert!(report.train_size >= 1 && report.future_size >= 1);
        assert!(report.summary.starts_with("Machine 1: "));
        assert!(report.summary.contains("anomalies (threshold="));
        assert_eq!(report.figures.len(), 2);
        assert_eq!(report.anomaly_flags.len(), report.future_errors.len());
        assert_eq!(report.loss_history.len(), 20);
        assert!(report.metrics.stage("train").is_some());
    }

    #[test]
    fn threshold_is_the_training_error_quantile() {
        let report = engine(fast_config()).detect(&two_machines(), spec(10), Some("2")).unwrap();
        assert_eq!(report.machine_serial, Serial::Int(2));
        let expected = quantile(&report.train_errors, 0.95).unwrap();
        assert!((report.threshold - expected).abs() < 1e-12);
        let flagged = report.future_errors.iter().filter(|&&e| e > report.threshold).count();
        assert_eq!(report.anomaly_count, flagged);
    }

    #[test]
    fn raising_the_quantile_never_lowers_the_threshold() {
        let mut last = f64::NEG_INFINITY;
        for q in [0.5, 0.75, 0.9, 0.95, 0.99] {
            let config = AnomalyConfig {
                threshold_quantile: q,
                visualize: false,
                ..fast_config()
            };
            let report = engine(config).detect(&two_machines(), spec(10), None).unwrap();
            assert!(report.threshold >= last, "q={q}");
            last = report.threshold;
        }
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        let ds = dataset(rows("1", 4, |i| i % 2));
        let err = engine(fast_config()).detect(&ds, spec(10), None).unwrap_err();
        assert_eq!(err.summary(), "Insufficient data: need at least 10 rows, but have 4");
    }

    #[test]
    fn unknown_machine_lists_available_serials() {
        let err = engine(fast_config())
            .detect(&two_machines(), spec(10), Some("7"))
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::MachineNotFound);
        assert_eq!(err.summary(), "Machine 7 not found in data. Available: 1, 2");
    }

    #[test]
    fn duplicate_runs_leave_no_windows() {
        // 20 rows but only two distinct alternations survive pruning.
        let ds = dataset(rows("1", 20, |i| usize::from(i >= 10)));
        let err = engine(fast_config()).detect(&ds, spec(10), None).unwrap_err();
        assert_eq!(err.reason(), FailureReason::DataInsufficiency);
    }

    #[test]
    fn fewer_than_min_sequences_is_insufficient() {
        let ds = dataset(rows("1", 11, |i| i % 2));
        let err = engine(fast_config()).detect(&ds, spec(10), None).unwrap_err();
        assert_eq!(
            err.summary(),
            "Insufficient data: machine 1 needs at least 3 sequences, but has 2"
        );
    }

    #[test]
    fn degenerate_single_window_follows_config() {
        let ds = dataset(rows("1", 10, |i| i % 3));
        let lenient = AnomalyConfig {
            min_sequences: 1,
            ..fast_config()
        };
        let report = engine(lenient.clone()).detect(&ds, spec(10), None).unwrap();
        assert_eq!(report.split_mode, SplitMode::Duplicated);
        assert_eq!(report.train_errors, report.future_errors);

        let strict = AnomalyConfig {
            degenerate_split: false,
            ..lenient
        };
        let err = engine(strict).detect(&ds, spec(10), None).unwrap_err();
        assert_eq!(err.reason(), FailureReason::DataInsufficiency);
    }

    #[test]
    fn visualization_can_be_disabled() {
        let config = AnomalyConfig {
            visualize: false,
            ..fast_config()
        };
        let report = engine(config).detect(&two_machines(), spec(10), None).unwrap();
        assert!(report.figures.is_empty());
        assert!(report.silhouette.is_some());
    }

    #[test]
    fn missing_columns_fail_with_schema_error() {
        let ds = Dataset::new(vec!["serial".into(), "alarm".into()], vec![vec!["1".into(), "3".into()]]);
        let err = engine(fast_config()).detect(&ds, spec(10), None).unwrap_err();
        assert_eq!(err.summary(), "Error: Missing required columns: timestamp");
    }

    #[test]
    fn invalid_window_fails_as_configuration() {
        let outcome = engine(fast_config()).run(&AnomalyRequest::new("unused.csv").with_window_size(1));
        assert_eq!(outcome.failure().unwrap().reason, FailureReason::Configuration);
        assert!(outcome.figures().is_empty());
    }
}
