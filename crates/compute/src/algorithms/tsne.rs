//! Exact t-SNE projection to two dimensions.
//!
//! O(n²) per iteration, so callers cap the point count (see
//! `AnomalyConfig::tsne_max_points`).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[derive(Debug, Clone, Copy)]
pub struct TsneOptions {
    pub perplexity: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TsneOptions {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            iterations: 500,
            learning_rate: 200.0,
            seed: 42,
        }
    }
}

const EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITERATIONS: usize = 250;
const MIN_GAIN: f64 = 0.01;

/// Embed `points` into 2-D.
///
/// Perplexity is clamped to `[1, n - 1]`. Fewer than two points embed at the
/// origin.
pub fn tsne(points: &[Vec<f64>], options: TsneOptions) -> Vec<[f64; 2]> {
    let n = points.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }
    let perplexity = options.perplexity.clamp(1.0, (n - 1) as f64);
    let p = joint_probabilities(points, perplexity);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut init = || 1e-2 * rng.sample::<f64, _>(StandardNormal);
    let mut y: Vec<[f64; 2]> = (0..n).map(|_| [init(), init()]).collect();
    let mut update = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];
    let mut num = vec![0.0f64; n * n];

    for iter in 0..options.iterations {
        let exaggeration = if iter < EXAGGERATION_ITERATIONS { EXAGGERATION } else { 1.0 };
        let momentum = if iter < EXAGGERATION_ITERATIONS { 0.5 } else { 0.8 };

        // Student-t affinities in the embedding.
        let mut sum_num = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let v = 1.0 / (1.0 + dx * dx + dy * dy);
                num[i * n + j] = v;
                num[j * n + i] = v;
                sum_num += 2.0 * v;
            }
        }
        let sum_num = sum_num.max(f64::MIN_POSITIVE);

        for i in 0..n {
            let mut grad = [0.0f64; 2];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[i * n + j] / sum_num).max(1e-12);
                let mult = (exaggeration * p[i * n + j] - q) * num[i * n + j];
                grad[0] += 4.0 * mult * (y[i][0] - y[j][0]);
                grad[1] += 4.0 * mult * (y[i][1] - y[j][1]);
            }
            for d in 0..2 {
                gains[i][d] = if (grad[d] > 0.0) != (update[i][d] > 0.0) {
                    gains[i][d] + 0.2
                } else {
                    (gains[i][d] * 0.8).max(MIN_GAIN)
                };
                update[i][d] = momentum * update[i][d] - options.learning_rate * gains[i][d] * grad[d];
            }
        }

        for (yi, ui) in y.iter_mut().zip(&update) {
            yi[0] += ui[0];
            yi[1] += ui[1];
        }
        recenter(&mut y);
    }
    y
}

/// Symmetrized input affinities `P` (row-major n x n).
fn joint_probabilities(points: &[Vec<f64>], perplexity: f64) -> Vec<f64> {
    let n = points.len();
    let mut dist = vec![0.0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            dist[i * n + j] = d;
            dist[j * n + i] = d;
        }
    }

    let mut conditional = vec![0.0f64; n * n];
    for i in 0..n {
        let row = &dist[i * n..(i + 1) * n];
        let probs = conditional_row(row, i, perplexity);
        conditional[i * n..(i + 1) * n].copy_from_slice(&probs);
    }

    let mut p = vec![0.0f64; n * n];
    let denom = 2.0 * n as f64;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                p[i * n + j] = ((conditional[i * n + j] + conditional[j * n + i]) / denom).max(1e-12);
            }
        }
    }
    p
}

/// Binary search the Gaussian precision for row `i` so its entropy matches
/// `ln(perplexity)`.
fn conditional_row(row: &[f64], i: usize, perplexity: f64) -> Vec<f64> {
    let target = perplexity.ln();
    let (mut beta, mut lo, mut hi) = (1.0f64, f64::NEG_INFINITY, f64::INFINITY);
    let mut probs = vec![0.0f64; row.len()];

    for _ in 0..64 {
        let mut sum = 0.0;
        for (j, &d) in row.iter().enumerate() {
            probs[j] = if j == i { 0.0 } else { (-d * beta).exp() };
            sum += probs[j];
        }
        if sum <= f64::MIN_POSITIVE {
            // Precision too high for every neighbour: widen the kernel.
            hi = beta;
            beta = if lo.is_finite() { (beta + lo) / 2.0 } else { beta / 2.0 };
            continue;
        }
        let weighted: f64 = row.iter().zip(&probs).map(|(d, p)| d * p).sum();
        let entropy = sum.ln() + beta * weighted / sum;
        for v in probs.iter_mut() {
            *v /= sum;
        }

        let diff = entropy - target;
        if diff.abs() < 1e-5 {
            break;
        }
        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
        } else {
            hi = beta;
            beta = if lo.is_finite() { (beta + lo) / 2.0 } else { beta / 2.0 };
        }
    }

    let total: f64 = probs.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        // Uniform over neighbours when every distance collapses.
        let uniform = 1.0 / (row.len() - 1) as f64;
        return (0..row.len()).map(|j| if j == i { 0.0 } else { uniform }).collect();
    }
    probs
}

fn recenter(y: &mut [[f64; 2]]) {
    let n = y.len() as f64;
    let (mx, my) = y.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    for p in y.iter_mut() {
        p[0] -= mx / n;
        p[1] -= my / n;
    }
}

/// Evenly strided subsample of at most `max_points` indices out of `n`.
pub fn stride_indices(n: usize, max_points: usize) -> Vec<usize> {
    if max_points == 0 {
        return Vec::new();
    }
    if n <= max_points {
        return (0..n).collect();
    }
    (0..max_points).map(|i| i * n / max_points).collect()
}
