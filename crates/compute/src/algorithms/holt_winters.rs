use alarmlog_core::{AlarmLogError, Result};
use serde::Serialize;

use super::optimize::nelder_mead;

/// Smoothing parameters, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Additive Holt-Winters (level + trend + seasonal) model.
#[derive(Debug, Clone)]
pub struct HoltWinters {
    params: SmoothingParams,
    period: usize,
    level: f64,
    trend: f64,
    /// Seasonal state, indexed by phase relative to the next observation.
    season: Vec<f64>,
    fitted: Vec<f64>,
    sse: f64,
}

struct Pass {
    level: f64,
    trend: f64,
    season: Vec<f64>,
    fitted: Vec<f64>,
    sse: f64,
}

impl HoltWinters {
    /// Fit smoothing parameters by minimizing one-step squared error.
    ///
    /// Needs at least two full seasons.
    pub fn fit(values: &[f64], period: usize) -> Result<Self> {
        if period < 2 {
            return Err(AlarmLogError::Configuration(format!(
                "Holt-Winters period must be at least 2, got {period}"
            )));
        }
        if values.len() < 2 * period {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "Holt-Winters needs {} observations, but have {}",
                2 * period,
                values.len()
            )));
        }

        let objective = |u: &[f64]| run(values, period, to_params(u)).sse;
        let min = nelder_mead(objective, &[0.0, -2.0, -1.0], 0.5, 1e-10, 600);
        let params = to_params(&min.point);
        let pass = run(values, period, params);

        Ok(Self {
            params,
            period,
            level: pass.level,
            trend: pass.trend,
            season: pass.season,
            fitted: pass.fitted,
            sse: pass.sse,
        })
    }

    pub fn params(&self) -> SmoothingParams {
        self.params
    }

    /// One-step-ahead in-sample predictions.
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    pub fn sse(&self) -> f64 {
        self.sse
    }

    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        (1..=steps)
            .map(|h| self.level + h as f64 * self.trend + self.season[(h - 1) % self.period])
            .collect()
    }
}

fn logistic(u: f64) -> f64 {
    1.0 / (1.0 + (-u).exp())
}

fn to_params(u: &[f64]) -> SmoothingParams {
    SmoothingParams {
        alpha: logistic(u[0]),
        beta: logistic(u[1]),
        gamma: logistic(u[2]),
    }
}

/// Run the recursions over `values`. Initial state comes from the first two
/// seasons.
fn run(values: &[f64], period: usize, params: SmoothingParams) -> Pass {
    let first = &values[..period];
    let second = &values[period..2 * period];
    let first_mean = first.iter().sum::<f64>() / period as f64;
    let second_mean = second.iter().sum::<f64>() / period as f64;

    let mut trend = (second_mean - first_mean) / period as f64;
    // The first season's mean sits at its midpoint; step back to t = -1.
    let mid = (period as f64 - 1.0) / 2.0;
    let mut level = first_mean - trend * (mid + 1.0);
    // Ring buffer: season[t % period] is the component for time t.
    let mut season: Vec<f64> = first
        .iter()
        .enumerate()
        .map(|(i, v)| v - (first_mean + trend * (i as f64 - mid)))
        .collect();

    let SmoothingParams { alpha, beta, gamma } = params;
    let mut fitted = Vec::with_capacity(values.len());
    let mut sse = 0.0;
    for (t, &y) in values.iter().enumerate() {
        let s = season[t % period];
        let prediction = level + trend + s;
        fitted.push(prediction);
        sse += (y - prediction).powi(2);

        let prev_level = level;
        level = alpha * (y - s) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        season[t % period] = gamma * (y - level) + (1.0 - gamma) * s;
    }

    // Rotate so index 0 is the phase of the first forecast step.
    let offset = values.len() % period;
    season.rotate_left(offset);

    Pass { level, trend, season, fitted, sse }
}
