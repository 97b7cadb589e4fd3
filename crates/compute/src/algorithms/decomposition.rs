use alarmlog_core::{AlarmLogError, Result};
use serde::Serialize;

/// Additive decomposition `observed = trend + seasonal + residual`.
///
/// Trend and residual are `None` for the half-window at either edge where the
/// centered moving average is undefined.
#[derive(Debug, Clone, Serialize)]
pub struct Decomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

/// Classical additive decomposition with a centered moving-average trend.
///
/// Needs `period >= 2` and at least two full periods of data.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(AlarmLogError::Configuration(format!(
            "decomposition period must be at least 2, got {period}"
        )));
    }
    if values.len() < 2 * period {
        return Err(AlarmLogError::DataInsufficiency(format!(
            "decomposition needs {} observations (two full periods), but have {}",
            2 * period,
            values.len()
        )));
    }

    let trend = centered_moving_average(values, period);

    // Per-phase mean of the detrended series, normalized to sum to zero.
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (t, (v, tr)) in values.iter().zip(&trend).enumerate() {
        if let Some(tr) = tr {
            sums[t % period] += v - tr;
            counts[t % period] += 1;
        }
    }
    let mut phase: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let offset = phase.iter().sum::<f64>() / period as f64;
    for p in phase.iter_mut() {
        *p -= offset;
    }

    let seasonal: Vec<f64> = (0..values.len()).map(|t| phase[t % period]).collect();
    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((v, tr), s)| tr.map(|tr| v - tr - s))
        .collect();

    Ok(Decomposition {
        period,
        observed: values.to_vec(),
        trend,
        seasonal,
        residual,
    })
}

/// Centered moving average of width `period`; even widths use the 2xP filter
/// (half weights on both ends).
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut out = vec![None; n];
    if n < 2 * half + 1 {
        return out;
    }
    for t in half..n - half {
        let window = &values[t - half..=t + half];
        let avg = if period % 2 == 1 {
            window.iter().sum::<f64>() / period as f64
        } else {
            let inner: f64 = window[1..window.len() - 1].iter().sum();
            (inner + 0.5 * (window[0] + window[window.len() - 1])) / period as f64
        };
        out[t] = Some(avg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly(n: usize) -> Vec<f64> {
        let pattern = [3.0, -1.0, 0.0, 2.0, -2.0, -1.5, -0.5];
        (0..n).map(|t| 10.0 + 0.5 * t as f64 + pattern[t % 7]).collect()
    }

    #[test]
    fn recovers_linear_trend_and_pattern() {
        let values = weekly(42);
        let d = seasonal_decompose(&values, 7).unwrap();

        assert!(d.trend[..3].iter().all(Option::is_none));
        assert!(d.trend[39..].iter().all(Option::is_none));
        for t in 3..39 {
            let tr = d.trend[t].unwrap();
            assert!((tr - (10.0 + 0.5 * t as f64)).abs() < 1e-9, "t={t}");
            assert!(d.residual[t].unwrap().abs() < 1e-9);
        }
        let pattern = [3.0, -1.0, 0.0, 2.0, -2.0, -1.5, -0.5];
        for (t, s) in d.seasonal.iter().enumerate() {
            assert!((s - pattern[t % 7]).abs() < 1e-9);
        }
    }

    #[test]
    fn seasonal_component_has_zero_mean() {
        let values: Vec<f64> = (0..30).map(|t| ((t * 37) % 11) as f64).collect();
        let d = seasonal_decompose(&values, 6).unwrap();
        let one_period: f64 = d.seasonal[..6].iter().sum();
        assert!(one_period.abs() < 1e-9);
    }

    #[test]
    fn even_period_uses_two_by_p_filter() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let ma = centered_moving_average(&values, 4);
        assert_eq!(ma[0], None);
        assert_eq!(ma[1], None);
        // (0.5*1 + 2 + 3 + 4 + 0.5*5) / 4
        assert_eq!(ma[2], Some(3.0));
        assert_eq!(ma[5], Some(6.0));
        assert_eq!(ma[6], None);
    }

    #[test]
    fn components_sum_to_observed() {
        let values: Vec<f64> = (0..28).map(|t| ((t * 13) % 7) as f64 + t as f64 * 0.1).collect();
        let d = seasonal_decompose(&values, 7).unwrap();
        for t in 0..values.len() {
            if let (Some(tr), Some(r)) = (d.trend[t], d.residual[t]) {
                assert!((tr + d.seasonal[t] + r - values[t]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn rejects_short_series_and_bad_period() {
        assert!(matches!(
            seasonal_decompose(&[1.0; 13], 7),
            Err(AlarmLogError::DataInsufficiency(_))
        ));
        assert!(matches!(
            seasonal_decompose(&[1.0; 13], 1),
            Err(AlarmLogError::Configuration(_))
        ));
    }
}
