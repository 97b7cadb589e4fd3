//! Daily alarm-volume forecasting.
//!
//! Rows are counted per calendar day, checked for stationarity, decomposed
//! for diagnostics and projected forward with a seasonal ARIMA model. An
//! additive Holt-Winters forecast can be appended as a secondary view.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use alarmlog_core::config::{ArimaOrder, ForecastConfig, RenderConfig, SeasonalOrder};
use alarmlog_core::{load_dataset, AlarmLogError, Dataset, EngineConfig, Result};

use crate::algorithms::adf::{adf_test, AdfResult};
use crate::algorithms::decomposition::{seasonal_decompose, Decomposition};
use crate::algorithms::holt_winters::{HoltWinters, SmoothingParams};
use crate::algorithms::sarima::{minimum_observations, SarimaCoefficients, SarimaModel};
use crate::algorithms::stats::autocorrelation;
use crate::outcome::{Figure, ForecastOutcome};
use crate::pipeline::{daily_counts, DailySeries, RunMetrics};
use crate::render::Renderer;

const MAX_ACF_LAG: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct ForecastRequest {
    pub path: PathBuf,
    /// Days to forecast; the engine's configured default when unset.
    pub steps: Option<usize>,
}

impl ForecastRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            steps: None,
        }
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }
}

/// One forecast day with its interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastDiagnostics {
    /// `None` when the series is too short for the test regression.
    pub adf: Option<AdfResult>,
    pub decomposition: Decomposition,
    pub order: ArimaOrder,
    pub seasonal_order: SeasonalOrder,
    pub coefficients: SarimaCoefficients,
    pub sigma2: f64,
    /// In-sample one-step mean squared error.
    pub mse: f64,
    /// Residual autocorrelation at lags 1, 2, ...
    pub residual_acf: Vec<f64>,
    pub optimizer_iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecondaryForecast {
    pub method: &'static str,
    pub params: SmoothingParams,
    pub sse: f64,
    pub forecast: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub observations: usize,
    pub steps: usize,
    pub confidence: f64,
    /// Predicted mean count per forecast day.
    pub forecast: BTreeMap<NaiveDate, f64>,
    pub points: Vec<ForecastPoint>,
    pub diagnostics: ForecastDiagnostics,
    pub secondary: Option<SecondaryForecast>,
    pub summary: String,
    pub figures: Vec<Figure>,
    pub metrics: RunMetrics,
}

/// Forecast engine bound to one configuration.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: ForecastConfig,
    renderer: Renderer,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig, render: &RenderConfig) -> Self {
        Self {
            config,
            renderer: Renderer::new(render),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.forecast.clone(), &config.render)
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Shortest daily series the configured models accept.
    pub fn minimum_history(&self) -> usize {
        let seasonal = self.config.seasonal_order;
        (2 * self.config.decomposition_period)
            .max(minimum_observations(self.config.order, seasonal))
            .max(2 * seasonal.period)
    }

    pub fn run(&self, request: &ForecastRequest) -> ForecastOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("forecasting", %run_id, path = %request.path.display());
        let _guard = span.enter();

        let outcome = ForecastOutcome::from(self.execute(request));
        match &outcome {
            ForecastOutcome::Success(report) => {
                info!(summary = %report.summary, total_ms = report.metrics.total_ms, "forecasting completed")
            }
            ForecastOutcome::Failure(failure) => {
                warn!(reason = ?failure.reason, summary = %failure.summary, "forecasting failed")
            }
        }
        outcome
    }

    /// Forecast from an already-loaded dataset.
    pub fn forecast(&self, dataset: &Dataset, steps: usize) -> Result<ForecastReport> {
        self.forecast_with_metrics(dataset, steps, RunMetrics::start())
    }

    fn execute(&self, request: &ForecastRequest) -> Result<ForecastReport> {
        let mut metrics = RunMetrics::start();
        let timer = metrics.timer("load");
        let dataset = load_dataset(&request.path)?;
        timer.finish(&mut metrics);
        info!(rows = dataset.len(), "dataset loaded");

        self.forecast_with_metrics(&dataset, request.steps.unwrap_or(self.config.steps), metrics)
    }

    fn validate(&self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Err(AlarmLogError::Configuration("steps must be at least 1".into()));
        }
        if !(self.config.confidence > 0.0 && self.config.confidence < 1.0) {
            return Err(AlarmLogError::Configuration(format!(
                "confidence must lie in (0, 1), got {}",
                self.config.confidence
            )));
        }
        if self.config.decomposition_period < 2 {
            return Err(AlarmLogError::Configuration(format!(
                "decomposition period must be at least 2, got {}",
                self.config.decomposition_period
            )));
        }
        Ok(())
    }

    fn forecast_with_metrics(
        &self,
        dataset: &Dataset,
        steps: usize,
        mut metrics: RunMetrics,
    ) -> Result<ForecastReport> {
        self.validate(steps)?;

        let timer = metrics.timer("aggregate");
        let series = daily_counts(dataset)?;
        timer.finish(&mut metrics);
        let needed = self.minimum_history();
        if series.len() < needed {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "forecasting needs at least {needed} days of history, but have {}",
                series.len()
            )));
        }
        info!(days = series.len(), start = %series.start, "daily series ready");

        let timer = metrics.timer("diagnose");
        let adf = adf_test(&series.counts);
        match &adf {
            Some(result) => debug!(
                statistic = result.statistic,
                p_value = result.p_value,
                stationary = result.is_stationary(),
                "ADF test"
            ),
            None => warn!("series too short for the ADF test"),
        }
        let decomposition = seasonal_decompose(&series.counts, self.config.decomposition_period)?;
        timer.finish(&mut metrics);

        let timer = metrics.timer("fit");
        let model = SarimaModel::fit(
            &series.counts,
            self.config.order,
            self.config.seasonal_order,
            self.config.max_iterations,
        )?;
        timer.finish(&mut metrics);
        if !model.converged() {
            warn!(iterations = model.iterations(), "SARIMA optimizer hit its iteration limit");
        }

        let timer = metrics.timer("forecast");
        let fc = model.forecast(steps, self.config.confidence);
        let points: Vec<ForecastPoint> = (0..steps)
            .map(|h| ForecastPoint {
                date: series.date_at(series.len() + h),
                mean: fc.mean[h],
                lower: fc.lower[h],
                upper: fc.upper[h],
            })
            .collect();
        let forecast: BTreeMap<NaiveDate, f64> = points.iter().map(|p| (p.date, p.mean)).collect();
        timer.finish(&mut metrics);

        let residuals = model.residuals();
        let residual_acf = autocorrelation(residuals, MAX_ACF_LAG.min(residuals.len() / 2));

        let secondary = if self.config.secondary_forecaster {
            self.secondary(&series, steps)
        } else {
            None
        };

        let timer = metrics.timer("render");
        let mut figures = Vec::with_capacity(5);
        let mut push = |fig: Result<Figure>, what: &str| match fig {
            Ok(fig) => figures.push(fig),
            Err(e) => warn!(error = %e, "skipping {what} figure"),
        };
        push(self.renderer.history(&series.counts), "history");
        push(
            self.renderer.forecast(&series.counts, &fc.mean, &fc.lower, &fc.upper),
            "forecast",
        );
        push(self.renderer.decomposition(&decomposition), "decomposition");
        push(
            self.renderer.diagnostics(&model.standardized_residuals(), &residual_acf),
            "diagnostics",
        );
        if let Some((hw, hw_forecast)) = &secondary {
            push(
                self.renderer.secondary_forecast(&series.counts, hw.fitted(), hw_forecast),
                "secondary forecast",
            );
        }
        timer.finish(&mut metrics);

        let history_end = series.date_at(series.len() - 1);
        let summary = match &adf {
            Some(a) => format!(
                "Forecast of {steps} days after {history_end} from {} days of history (ADF p-value={:.4})",
                series.len(),
                a.p_value
            ),
            None => format!(
                "Forecast of {steps} days after {history_end} from {} days of history",
                series.len()
            ),
        };
        metrics.finish();

        Ok(ForecastReport {
            history_start: series.start,
            history_end,
            observations: series.len(),
            steps,
            confidence: fc.confidence,
            forecast,
            points,
            diagnostics: ForecastDiagnostics {
                adf,
                decomposition,
                order: self.config.order,
                seasonal_order: self.config.seasonal_order,
                coefficients: model.coefficients().clone(),
                sigma2: model.sigma2(),
                mse: model.mse(),
                residual_acf,
                optimizer_iterations: model.iterations(),
                converged: model.converged(),
            },
            secondary: secondary.map(|(hw, values)| SecondaryForecast {
                method: "holt_winters_additive",
                params: hw.params(),
                sse: hw.sse(),
                forecast: values
                    .iter()
                    .enumerate()
                    .map(|(h, &v)| (series.date_at(series.len() + h), v))
                    .collect(),
            }),
            summary,
            figures,
            metrics,
        })
    }

    /// Holt-Winters over the decomposition period; skipped below two seasons.
    fn secondary(&self, series: &DailySeries, steps: usize) -> Option<(HoltWinters, Vec<f64>)> {
        match HoltWinters::fit(&series.counts, self.config.decomposition_period) {
            Ok(model) => {
                let values = model.forecast(steps);
                Some((model, values))
            }
            Err(e) => {
                warn!(error = %e, "skipping secondary forecaster");
                None
            }
        }
    }
}

/// Forecast daily alarm counts with default settings.
pub fn run_forecasting(path: impl AsRef<Path>, steps: usize) -> ForecastOutcome {
    let engine = ForecastEngine::new(ForecastConfig::default(), &RenderConfig::default());
    engine.run(&ForecastRequest::new(path.as_ref()).with_steps(steps))
}
