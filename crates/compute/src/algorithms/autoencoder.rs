//! Dense reconstruction autoencoder trained with full-batch Adam.
//!
//! Architecture (W = window width, L = latent width):
//! - encoder: `Linear(W, L)` + ReLU
//! - decoder: `Linear(L, W)` + `Linear(W, W)`
//!
//! The model is unsupervised: "normal" is whatever the training windows look
//! like, and reconstruction error is the anomaly score.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fully connected layer with weights stored `(out, in)`.
#[derive(Debug, Clone)]
struct Linear {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl Linear {
    /// Uniform(-1/sqrt(in), 1/sqrt(in)) initialization for weights and bias.
    fn new(input: usize, output: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (input as f64).sqrt();
        let weight = Array2::from_shape_fn((output, input), |_| rng.gen_range(-bound..=bound));
        let bias = Array1::from_shape_fn(output, |_| rng.gen_range(-bound..=bound));
        Self { weight, bias }
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

/// Gradients for one linear layer.
struct LinearGrad {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

/// First and second moment estimates for one linear layer.
#[derive(Debug, Clone)]
struct AdamState {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl AdamState {
    fn for_layer(layer: &Linear) -> Self {
        Self {
            m_w: Array2::zeros(layer.weight.raw_dim()),
            v_w: Array2::zeros(layer.weight.raw_dim()),
            m_b: Array1::zeros(layer.bias.raw_dim()),
            v_b: Array1::zeros(layer.bias.raw_dim()),
        }
    }
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Adam parameter update for one layer at (1-based) step `t`.
fn adam_step(layer: &mut Linear, grad: &LinearGrad, state: &mut AdamState, lr: f64, t: i32) {
    let bias1 = 1.0 - BETA1.powi(t);
    let bias2 = 1.0 - BETA2.powi(t);

    state.m_w = &state.m_w * BETA1 + &grad.weight * (1.0 - BETA1);
    state.v_w = &state.v_w * BETA2 + &grad.weight.mapv(|g| g * g) * (1.0 - BETA2);
    state.m_b = &state.m_b * BETA1 + &grad.bias * (1.0 - BETA1);
    state.v_b = &state.v_b * BETA2 + &grad.bias.mapv(|g| g * g) * (1.0 - BETA2);

    ndarray::Zip::from(&mut layer.weight)
        .and(&state.m_w)
        .and(&state.v_w)
        .for_each(|w, &m, &v| *w -= lr * (m / bias1) / ((v / bias2).sqrt() + EPSILON));
    ndarray::Zip::from(&mut layer.bias)
        .and(&state.m_b)
        .and(&state.v_b)
        .for_each(|b, &m, &v| *b -= lr * (m / bias1) / ((v / bias2).sqrt() + EPSILON));
}

/// Training hyper-parameters.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub latent_dim: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

/// A trained window autoencoder.
#[derive(Debug, Clone)]
pub struct Autoencoder {
    encoder: Linear,
    decoder_hidden: Linear,
    decoder_out: Linear,
    /// Mean squared reconstruction loss before each epoch's update.
    loss_history: Vec<f64>,
}

impl Autoencoder {
    /// Fresh, untrained model for windows of width `input_dim`.
    pub fn new(input_dim: usize, latent_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            encoder: Linear::new(input_dim, latent_dim, &mut rng),
            decoder_hidden: Linear::new(latent_dim, input_dim, &mut rng),
            decoder_out: Linear::new(input_dim, input_dim, &mut rng),
            loss_history: Vec::new(),
        }
    }

    /// Fit a fresh model to `train` (rows are windows).
    pub fn train(train: &Array2<f64>, options: TrainOptions) -> Self {
        let mut model = Self::new(train.ncols(), options.latent_dim.max(1), options.seed);
        model.fit(train, options.epochs, options.learning_rate);
        model
    }

    /// Run `epochs` full-batch Adam steps minimizing mean squared error.
    pub fn fit(&mut self, train: &Array2<f64>, epochs: usize, learning_rate: f64) {
        if train.nrows() == 0 {
            return;
        }
        let mut states = [
            AdamState::for_layer(&self.encoder),
            AdamState::for_layer(&self.decoder_hidden),
            AdamState::for_layer(&self.decoder_out),
        ];
        let scale = 2.0 / train.len() as f64;

        for epoch in 0..epochs {
            // Forward pass, keeping activations for backprop.
            let pre_latent = self.encoder.forward(train);
            let latent = pre_latent.mapv(relu);
            let hidden = self.decoder_hidden.forward(&latent);
            let output = self.decoder_out.forward(&hidden);

            let diff = &output - train;
            let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);
            self.loss_history.push(loss);

            // Backward pass.
            let d_output = diff * scale;
            let g_out = LinearGrad {
                weight: d_output.t().dot(&hidden),
                bias: d_output.sum_axis(Axis(0)),
            };
            let d_hidden = d_output.dot(&self.decoder_out.weight);
            let g_hidden = LinearGrad {
                weight: d_hidden.t().dot(&latent),
                bias: d_hidden.sum_axis(Axis(0)),
            };
            let mut d_pre = d_hidden.dot(&self.decoder_hidden.weight);
            ndarray::Zip::from(&mut d_pre)
                .and(&pre_latent)
                .for_each(|d, &z| {
                    if z <= 0.0 {
                        *d = 0.0;
                    }
                });
            let g_enc = LinearGrad {
                weight: d_pre.t().dot(train),
                bias: d_pre.sum_axis(Axis(0)),
            };

            let t = i32::try_from(epoch + 1).unwrap_or(i32::MAX);
            let [s_enc, s_hidden, s_out] = &mut states;
            adam_step(&mut self.encoder, &g_enc, s_enc, learning_rate, t);
            adam_step(&mut self.decoder_hidden, &g_hidden, s_hidden, learning_rate, t);
            adam_step(&mut self.decoder_out, &g_out, s_out, learning_rate, t);
        }
    }

    /// Latent representation (encoder output) of each window.
    pub fn encode(&self, x: &Array2<f64>) -> Array2<f64> {
        self.encoder.forward(x).mapv(relu)
    }

    pub fn reconstruct(&self, x: &Array2<f64>) -> Array2<f64> {
        let latent = self.encode(x);
        self.decoder_out.forward(&self.decoder_hidden.forward(&latent))
    }

    /// Mean absolute reconstruction error per window.
    pub fn reconstruction_errors(&self, x: &Array2<f64>) -> Vec<f64> {
        if x.nrows() == 0 {
            return Vec::new();
        }
        let recon = self.reconstruct(x);
        (x - &recon)
            .mapv(f64::abs)
            .mean_axis(Axis(1))
            .map(|errs| errs.to_vec())
            .unwrap_or_default()
    }

    /// Mean squared reconstruction loss over `x`.
    pub fn loss(&self, x: &Array2<f64>) -> f64 {
        let recon = self.reconstruct(x);
        (x - &recon).mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }
}

#[inline]
fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Stack equal-width windows into a row matrix.
///
/// Returns `None` when the windows are ragged.
pub fn to_matrix(windows: &[Vec<f64>]) -> Option<Array2<f64>> {
    let width = windows.first().map_or(0, Vec::len);
    let flat: Vec<f64> = windows.iter().flatten().copied().collect();
    Array2::from_shape_vec((windows.len(), width), flat).ok()
}
