use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub anomaly: AnomalyConfig,
    pub forecast: ForecastConfig,
    pub synthetic: SyntheticConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ALARMLOG_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ALARMLOG_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            anomaly: AnomalyConfig::from_env_profiled(p),
            forecast: ForecastConfig::from_env_profiled(p),
            synthetic: SyntheticConfig::from_env_profiled(p),
            render: RenderConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  anomaly:   window={}, horizon={}, latent={}, epochs={}, lr={}, quantile={}",
            self.anomaly.window_size,
            self.anomaly.forecast_horizon,
            self.anomaly.latent_dim,
            self.anomaly.epochs,
            self.anomaly.learning_rate,
            self.anomaly.threshold_quantile
        );
        tracing::info!(
            "  forecast:  steps={}, order={:?}, seasonal={:?}, secondary={}",
            self.forecast.steps,
            self.forecast.order,
            self.forecast.seasonal_order,
            self.forecast.secondary_forecaster
        );
        tracing::info!(
            "  synthetic: output={}, sentinel={}",
            self.synthetic.output_path.display(),
            self.synthetic.sentinel
        );
        tracing::info!("  render:    {}x{}", self.render.width, self.render.height);
    }
}

// ── Anomaly detection ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    pub window_size: usize,
    pub forecast_horizon: usize,
    /// Width of the autoencoder bottleneck.
    pub latent_dim: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Training-error quantile used as the anomaly cutoff.
    pub threshold_quantile: f64,
    /// Share of a machine's windows used for training (by order).
    pub train_fraction: f64,
    /// Fewest windows a machine needs before a split is attempted.
    pub min_sequences: usize,
    /// Duplicate a lone window into both partitions instead of failing.
    pub degenerate_split: bool,
    pub clusters: usize,
    /// Produce the error curve and latent-space figures.
    pub visualize: bool,
    pub tsne_iterations: usize,
    pub tsne_max_points: usize,
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            forecast_horizon: 1,
            latent_dim: 32,
            epochs: 20,
            learning_rate: 0.001,
            threshold_quantile: 0.95,
            train_fraction: 0.7,
            min_sequences: 3,
            degenerate_split: true,
            clusters: 4,
            visualize: true,
            tsne_iterations: 500,
            tsne_max_points: 500,
            seed: 42,
        }
    }
}

impl AnomalyConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            window_size: profiled_env_parse(p, "ANOMALY_WINDOW_SIZE", d.window_size),
            forecast_horizon: profiled_env_parse(p, "ANOMALY_FORECAST_HORIZON", d.forecast_horizon),
            latent_dim: profiled_env_parse(p, "ANOMALY_LATENT_DIM", d.latent_dim),
            epochs: profiled_env_parse(p, "ANOMALY_EPOCHS", d.epochs),
            learning_rate: profiled_env_parse(p, "ANOMALY_LEARNING_RATE", d.learning_rate),
            threshold_quantile: profiled_env_parse(p, "ANOMALY_THRESHOLD_QUANTILE", d.threshold_quantile),
            train_fraction: profiled_env_parse(p, "ANOMALY_TRAIN_FRACTION", d.train_fraction),
            min_sequences: profiled_env_parse(p, "ANOMALY_MIN_SEQUENCES", d.min_sequences),
            degenerate_split: profiled_env_bool(p, "ANOMALY_DEGENERATE_SPLIT", d.degenerate_split),
            clusters: profiled_env_parse(p, "ANOMALY_CLUSTERS", d.clusters),
            visualize: profiled_env_bool(p, "ANOMALY_VISUALIZE", d.visualize),
            tsne_iterations: profiled_env_parse(p, "ANOMALY_TSNE_ITERATIONS", d.tsne_iterations),
            tsne_max_points: profiled_env_parse(p, "ANOMALY_TSNE_MAX_POINTS", d.tsne_max_points),
            seed: profiled_env_parse(p, "ANOMALY_SEED", d.seed),
        }
    }
}

// ── Forecasting ───────────────────────────────────────────────

/// Non-seasonal (p, d, q) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal (P, D, Q, s) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

fn parse_usizes(raw: &str) -> Option<Vec<usize>> {
    raw.split(',').map(|part| part.trim().parse().ok()).collect()
}

impl FromStr for ArimaOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_usizes(s).as_deref() {
            Some(&[p, d, q]) => Ok(Self { p, d, q }),
            _ => Err(format!("expected 'p,d,q', got '{s}'")),
        }
    }
}

impl FromStr for SeasonalOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_usizes(s).as_deref() {
            Some(&[p, d, q, period]) if period >= 1 => Ok(Self { p, d, q, period }),
            _ => Err(format!("expected 'P,D,Q,s' with s >= 1, got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub steps: usize,
    pub order: ArimaOrder,
    pub seasonal_order: SeasonalOrder,
    /// Period used by the diagnostic decomposition (7 = weekly on daily data).
    pub decomposition_period: usize,
    /// Two-sided confidence level of the forecast band.
    pub confidence: f64,
    /// Run the Holt-Winters secondary forecaster and append its figure.
    pub secondary_forecaster: bool,
    /// Nelder-Mead iteration budget for the SARIMA fit.
    pub max_iterations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            steps: 30,
            order: ArimaOrder { p: 1, d: 1, q: 1 },
            seasonal_order: SeasonalOrder { p: 1, d: 1, q: 1, period: 12 },
            decomposition_period: 7,
            confidence: 0.95,
            secondary_forecaster: true,
            max_iterations: 400,
        }
    }
}

impl ForecastConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            steps: profiled_env_parse(p, "FORECAST_STEPS", d.steps),
            order: profiled_env_parse(p, "FORECAST_ORDER", d.order),
            seasonal_order: profiled_env_parse(p, "FORECAST_SEASONAL_ORDER", d.seasonal_order),
            decomposition_period: profiled_env_parse(p, "FORECAST_DECOMPOSITION_PERIOD", d.decomposition_period),
            confidence: profiled_env_parse(p, "FORECAST_CONFIDENCE", d.confidence),
            secondary_forecaster: profiled_env_bool(p, "FORECAST_SECONDARY", d.secondary_forecaster),
            max_iterations: profiled_env_parse(p, "FORECAST_MAX_ITERATIONS", d.max_iterations),
        }
    }
}

// ── Synthetic data ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Fixed output file; not collision-safe across concurrent runs.
    pub output_path: PathBuf,
    /// Alarm code written into injected anomaly rows.
    pub sentinel: i64,
    /// RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("synthetic_alarms.csv"),
            sentinel: -1,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            output_path: profiled_env_opt(p, "SYNTHETIC_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(d.output_path),
            sentinel: profiled_env_parse(p, "SYNTHETIC_SENTINEL", d.sentinel),
            seed: profiled_env_opt(p, "SYNTHETIC_SEED").and_then(|v| v.trim().parse().ok()),
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { width: 800, height: 400 }
    }
}

impl RenderConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            width: profiled_env_parse(p, "RENDER_WIDTH", d.width).max(64),
            height: profiled_env_parse(p, "RENDER_HEIGHT", d.height).max(64),
        }
    }
}
