//! Seasonal ARIMA fitted by conditional sum of squares.
//!
//! The model is written in terms of the undifferenced series:
//!
//! ```text
//! φ(B) Φ(B^s) (1-B)^d (1-B^s)^D y_t = θ(B) Θ(B^s) e_t
//! ```
//!
//! Expanding the left side into a single lag polynomial lets fitting,
//! forecasting and psi-weights share one recursion. No constant term.

use alarmlog_core::config::{ArimaOrder, SeasonalOrder};
use alarmlog_core::{AlarmLogError, Result};
use serde::Serialize;
use tracing::debug;

use super::optimize::nelder_mead;
use super::stats::normal_quantile;

/// Coefficients are kept inside (-BOUND, BOUND) through a tanh transform.
const BOUND: f64 = 0.99;

/// Fitted coefficients, grouped by polynomial.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SarimaCoefficients {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SarimaModel {
    order: ArimaOrder,
    seasonal: SeasonalOrder,
    coefficients: SarimaCoefficients,
    /// `c_i` in `y_t = Σ c_i y_{t-i} + e_t + Σ m_j e_{t-j}`.
    ar_lags: Vec<f64>,
    /// `m_j` (index 0 is lag 1).
    ma_lags: Vec<f64>,
    history: Vec<f64>,
    residuals: Vec<f64>,
    /// First index with a conditional residual.
    start: usize,
    sigma2: f64,
    iterations: usize,
    converged: bool,
}

/// Per-step forecast means, standard errors and interval bounds.
#[derive(Debug, Clone, Serialize)]
pub struct SarimaForecast {
    pub mean: Vec<f64>,
    pub std_err: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub confidence: f64,
}

/// Number of observations the model needs before the first residual, plus
/// two so a variance can be estimated.
pub fn minimum_observations(order: ArimaOrder, seasonal: SeasonalOrder) -> usize {
    let s = seasonal.period;
    order.d + seasonal.d * s + order.p + seasonal.p * s + order.q + seasonal.q * s + 2
}

impl SarimaModel {
    /// Fit by minimizing the conditional sum of squares with Nelder-Mead.
    pub fn fit(
        values: &[f64],
        order: ArimaOrder,
        seasonal: SeasonalOrder,
        max_iterations: usize,
    ) -> Result<Self> {
        if seasonal.period == 0 {
            return Err(AlarmLogError::Configuration("seasonal period must be at least 1".into()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AlarmLogError::Numeric("series contains non-finite values".into()));
        }
        let needed = minimum_observations(order, seasonal);
        if values.len() < needed {
            return Err(AlarmLogError::DataInsufficiency(format!(
                "SARIMA{:?}x{:?} needs at least {} observations, but have {}",
                (order.p, order.d, order.q),
                (seasonal.p, seasonal.d, seasonal.q, seasonal.period),
                needed,
                values.len()
            )));
        }

        let n_params = order.p + order.q + seasonal.p + seasonal.q;
        let objective = |u: &[f64]| {
            let coefs = unpack(u, order, seasonal);
            let (ar_lags, ma_lags) = lag_polynomials(&coefs, order, seasonal);
            let (residuals, start) = conditional_residuals(values, &ar_lags, &ma_lags);
            let count = values.len() - start;
            residuals[start..].iter().map(|e| e * e).sum::<f64>() / count as f64
        };
        let min = nelder_mead(objective, &vec![0.0; n_params], 0.5, 1e-10, max_iterations);

        let coefficients = unpack(&min.point, order, seasonal);
        let (ar_lags, ma_lags) = lag_polynomials(&coefficients, order, seasonal);
        let (residuals, start) = conditional_residuals(values, &ar_lags, &ma_lags);
        let count = values.len() - start;
        let sigma2 = residuals[start..].iter().map(|e| e * e).sum::<f64>() / count as f64;
        if !sigma2.is_finite() {
            return Err(AlarmLogError::Numeric("SARIMA fit diverged".into()));
        }

        debug!(
            iterations = min.iterations,
            converged = min.converged,
            sigma2,
            "SARIMA fit complete"
        );

        Ok(Self {
            order,
            seasonal,
            coefficients,
            ar_lags,
            ma_lags,
            history: values.to_vec(),
            residuals,
            start,
            sigma2,
            iterations: min.iterations,
            converged: min.converged,
        })
    }

    pub fn order(&self) -> (ArimaOrder, SeasonalOrder) {
        (self.order, self.seasonal)
    }

    pub fn coefficients(&self) -> &SarimaCoefficients {
        &self.coefficients
    }

    /// Innovation variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Residuals from the first conditionally defined index onward.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals[self.start..]
    }

    /// Residuals divided by the innovation standard deviation.
    pub fn standardized_residuals(&self) -> Vec<f64> {
        let sd = self.sigma2.sqrt();
        self.residuals()
            .iter()
            .map(|e| if sd > 0.0 { e / sd } else { 0.0 })
            .collect()
    }

    /// One-step-ahead in-sample predictions; `None` before enough history.
    pub fn fitted(&self) -> Vec<Option<f64>> {
        self.history
            .iter()
            .zip(&self.residuals)
            .enumerate()
            .map(|(t, (y, e))| (t >= self.start).then(|| y - e))
            .collect()
    }

    /// In-sample mean squared one-step error.
    pub fn mse(&self) -> f64 {
        self.sigma2
    }

    /// Forecast `steps` periods past the end of the history.
    pub fn forecast(&self, steps: usize, confidence: f64) -> SarimaForecast {
        let n = self.history.len();
        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        y.reserve(steps);
        e.resize(n + steps, 0.0);

        for t in n..n + steps {
            let ar: f64 = self.ar_lags.iter().enumerate().map(|(i, c)| c * y[t - i - 1]).sum();
            let ma: f64 = self
                .ma_lags
                .iter()
                .enumerate()
                .filter(|(j, _)| t > *j)
                .map(|(j, m)| m * e[t - j - 1])
                .sum();
            y.push(ar + ma);
        }
        let mean = y[n..].to_vec();

        let psi = self.psi_weights(steps);
        let mut cumulative = 0.0;
        let std_err: Vec<f64> = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        let z = normal_quantile(0.5 + confidence.clamp(0.0, 0.999_999) / 2.0);
        let lower = mean.iter().zip(&std_err).map(|(m, s)| m - z * s).collect();
        let upper = mean.iter().zip(&std_err).map(|(m, s)| m + z * s).collect();

        SarimaForecast { mean, std_err, lower, upper, confidence }
    }

    /// MA(∞) weights ψ_0..ψ_{k-1} of the expanded model.
    fn psi_weights(&self, k: usize) -> Vec<f64> {
        let mut psi = Vec::with_capacity(k);
        for h in 0..k {
            if h == 0 {
                psi.push(1.0);
                continue;
            }
            let ma = self.ma_lags.get(h - 1).copied().unwrap_or(0.0);
            let ar: f64 = self
                .ar_lags
                .iter()
                .enumerate()
                .take(h)
                .map(|(i, c)| c * psi[h - i - 1])
                .sum();
            psi.push(ma + ar);
        }
        psi
    }
}

fn bounded(u: f64) -> f64 {
    BOUND * u.tanh()
}

fn unpack(u: &[f64], order: ArimaOrder, seasonal: SeasonalOrder) -> SarimaCoefficients {
    let mut it = u.iter().map(|&v| bounded(v));
    SarimaCoefficients {
        ar: it.by_ref().take(order.p).collect(),
        ma: it.by_ref().take(order.q).collect(),
        seasonal_ar: it.by_ref().take(seasonal.p).collect(),
        seasonal_ma: it.by_ref().take(seasonal.q).collect(),
    }
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        if *x == 0.0 {
            continue;
        }
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign * (c_1 B^step + c_2 B^{2 step} + ...)`.
fn lag_poly(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * step + 1];
    poly[0] = 1.0;
    for (k, c) in coefs.iter().enumerate() {
        poly[(k + 1) * step] = sign * c;
    }
    poly
}

/// Expand into `(c, m)` with `y_t = Σ c_i y_{t-i} + e_t + Σ m_j e_{t-j}`.
fn lag_polynomials(
    coefs: &SarimaCoefficients,
    order: ArimaOrder,
    seasonal: SeasonalOrder,
) -> (Vec<f64>, Vec<f64>) {
    let s = seasonal.period;
    let mut ar = poly_mul(&lag_poly(&coefs.ar, 1, -1.0), &lag_poly(&coefs.seasonal_ar, s, -1.0));
    for _ in 0..order.d {
        ar = poly_mul(&ar, &[1.0, -1.0]);
    }
    for _ in 0..seasonal.d {
        ar = poly_mul(&ar, &lag_poly(&[1.0], s, -1.0));
    }
    let ma = poly_mul(&lag_poly(&coefs.ma, 1, 1.0), &lag_poly(&coefs.seasonal_ma, s, 1.0));

    let ar_lags = ar[1..].iter().map(|a| -a).collect();
    let ma_lags = ma[1..].to_vec();
    (ar_lags, ma_lags)
}

/// Residuals conditional on zero pre-sample innovations. Entries before the
/// returned start index are zero.
fn conditional_residuals(y: &[f64], ar_lags: &[f64], ma_lags: &[f64]) -> (Vec<f64>, usize) {
    let start = ar_lags.len().min(y.len());
    let mut e = vec![0.0; y.len()];
    for t in start..y.len() {
        let ar: f64 = ar_lags.iter().enumerate().map(|(i, c)| c * y[t - i - 1]).sum();
        let ma: f64 = ma_lags
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, m)| m * e[t - j - 1])
            .sum();
        e[t] = y[t] - ar - ma;
    }
    (e, start)
}
