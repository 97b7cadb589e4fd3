//! Augmented Dickey-Fuller unit-root test (constant, no trend).
//!
//! Lag order is chosen by AIC over `0..=maxlag` with
//! `maxlag = floor(12 * (n / 100)^(1/4))`, then the regression is refit on
//! the largest sample that lag allows. P-values and critical values use
//! MacKinnon's response-surface approximations.

use serde::Serialize;

use super::stats::{normal_cdf, ols};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_percent: f64,
    #[serde(rename = "5%")]
    pub five_percent: f64,
    #[serde(rename = "10%")]
    pub ten_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

impl AdfResult {
    /// Unit root rejected at the 5% level.
    pub fn is_stationary(&self) -> bool {
        self.p_value < 0.05
    }
}

/// Run the test. Returns `None` when the series is too short or constant.
pub fn adf_test(values: &[f64]) -> Option<AdfResult> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let diff: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    // Keep enough observations for the widest regression.
    let maxlag = schwert.min((n / 2).saturating_sub(2));

    // AIC over a common sample starting at maxlag.
    let mut best_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=maxlag {
        let (x, y) = design(values, &diff, lag, maxlag);
        let Some(fit) = ols(&x, &y) else { continue };
        let nobs = fit.nobs as f64;
        let k = (lag + 2) as f64;
        let aic = nobs * (fit.rss / nobs).max(f64::MIN_POSITIVE).ln() + 2.0 * k;
        if aic < best_aic {
            best_aic = aic;
            best_lag = lag;
        }
    }

    let (x, y) = design(values, &diff, best_lag, best_lag);
    let fit = ols(&x, &y)?;
    let se = fit.std_err[0];
    if se <= 0.0 || !se.is_finite() {
        return None;
    }
    let statistic = fit.coef[0] / se;

    Some(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag: best_lag,
        nobs: fit.nobs,
        critical_values: mackinnon_critical_values(fit.nobs),
    })
}

/// Regress `diff[t]` on `[level_{t}, 1, diff[t-1], .., diff[t-lag]]` for
/// `t` from `start`.
fn design(values: &[f64], diff: &[f64], lag: usize, start: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut x = Vec::with_capacity(diff.len().saturating_sub(start));
    let mut y = Vec::with_capacity(x.capacity());
    for t in start..diff.len() {
        let mut row = Vec::with_capacity(lag + 2);
        row.push(values[t]);
        row.push(1.0);
        row.extend((1..=lag).map(|i| diff[t - i]));
        x.push(row);
        y.push(diff[t]);
    }
    (x, y)
}

/// MacKinnon (1994) approximate p-value, constant-only regression, one series.
pub fn mackinnon_p_value(stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.86;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coef: &[f64] = if stat <= TAU_STAR { &SMALL_P } else { &LARGE_P };
    normal_cdf(polyval(coef, stat))
}

/// MacKinnon (2010) critical values for sample size `nobs`.
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    const ONE: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
    const FIVE: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
    const TEN: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

    let inv = 1.0 / nobs.max(1) as f64;
    CriticalValues {
        one_percent: polyval(&ONE, inv),
        five_percent: polyval(&FIVE, inv),
        ten_percent: polyval(&TEN, inv),
    }
}

/// `c[0] + c[1] x + c[2] x² + ...`
fn polyval(coef: &[f64], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
