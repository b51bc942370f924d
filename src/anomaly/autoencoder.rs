// Logwarden - GPL-3.0-or-later

//! Dense autoencoder scored by reconstruction error.
//!
//! Network: in -> max(8, in) -> max(2, in / 2) -> max(8, in) -> in, ReLU on
//! every hidden layer, linear output. Trained full-batch with Adam on mean
//! squared error over standardised inputs.

use crate::anomaly::model::{ModelKind, ScoreModel};
use crate::config::AutoencoderParams;
use crate::features::{FeatureVector, FEATURE_COUNT};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Per-column standardisation fitted on the training rows
#[derive(Debug, Clone)]
struct Scaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl Scaler {
    fn fit(rows: &[FeatureVector]) -> Self {
        let n = rows.len() as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];

        for (col, m) in mean.iter_mut().enumerate() {
            *m = rows.iter().map(|r| r.0[col]).sum::<f64>() / n;
        }
        for (col, s) in scale.iter_mut().enumerate() {
            let var = rows.iter().map(|r| (r.0[col] - mean[col]).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            *s = if sd > 0.0 { sd } else { 1.0 };
        }

        Self { mean, scale }
    }

    fn transform(&self, row: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (col, value) in out.iter_mut().enumerate() {
            *value = (row.0[col] - self.mean[col]) / self.scale[col];
        }
        out
    }
}

/// Adam first and second moment estimates for one parameter buffer
#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Moments {
    fn zeros(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64], lr: f64, t: i32) {
        let correction1 = 1.0 - ADAM_BETA1.powi(t);
        let correction2 = 1.0 - ADAM_BETA2.powi(t);

        for (i, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            self.m[i] = ADAM_BETA1 * self.m[i] + (1.0 - ADAM_BETA1) * g;
            self.v[i] = ADAM_BETA2 * self.v[i] + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = self.m[i] / correction1;
            let v_hat = self.v[i] / correction2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        }
    }
}

/// Fully connected layer, weights stored row-major as `outputs x inputs`
#[derive(Debug, Clone)]
struct Dense {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
    relu: bool,
}

impl Dense {
    fn new(inputs: usize, outputs: usize, relu: bool, rng: &mut ChaCha8Rng) -> Self {
        let bound = 1.0 / (inputs as f64).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.gen_range(-bound..bound))
                .collect(),
            bias: (0..outputs).map(|_| rng.gen_range(-bound..bound)).collect(),
            relu,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                let z = self.bias[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
                if self.relu {
                    z.max(0.0)
                } else {
                    z
                }
            })
            .collect()
    }
}

/// Fitted reconstruction-error model
#[derive(Debug, Clone)]
pub struct Autoencoder {
    scaler: Scaler,
    layers: Vec<Dense>,
}

impl Autoencoder {
    /// Train on the baseline rows.
    ///
    /// Returns `None` when there is nothing to learn from or the loss stops
    /// being finite; callers treat that as the model being unavailable.
    #[must_use]
    pub fn fit(rows: &[FeatureVector], params: &AutoencoderParams) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let in_dim = FEATURE_COUNT;
        let hidden = in_dim.max(8);
        let bottleneck = (in_dim / 2).max(2);

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut model = Self {
            scaler: Scaler::fit(rows),
            layers: vec![
                Dense::new(in_dim, hidden, true, &mut rng),
                Dense::new(hidden, bottleneck, true, &mut rng),
                Dense::new(bottleneck, hidden, true, &mut rng),
                Dense::new(hidden, in_dim, false, &mut rng),
            ],
        };

        let inputs: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| model.scaler.transform(r).to_vec())
            .collect();

        let mut moments: Vec<(Moments, Moments)> = model
            .layers
            .iter()
            .map(|l| (Moments::zeros(l.weights.len()), Moments::zeros(l.bias.len())))
            .collect();

        let start = std::time::Instant::now();
        let mut loss = f64::NAN;
        for (epoch, t) in (0..params.epochs).zip(1_i32..) {
            loss = model.train_epoch(&inputs, &mut moments, params.learning_rate, t);
            if !loss.is_finite() {
                tracing::warn!("Autoencoder loss diverged at epoch {epoch}, dropping the model");
                return None;
            }
        }

        tracing::debug!(
            "Trained autoencoder for {} epochs in {:?}, final loss {loss:.6}",
            params.epochs,
            start.elapsed()
        );
        Some(model)
    }

    /// One full-batch forward/backward pass; returns the loss before the update
    fn train_epoch(
        &mut self,
        inputs: &[Vec<f64>],
        moments: &mut [(Moments, Moments)],
        lr: f64,
        t: i32,
    ) -> f64 {
        let n = inputs.len();

        // activations[l][row] is the input to layer l; the last entry is the output
        let mut activations: Vec<Vec<Vec<f64>>> = Vec::with_capacity(self.layers.len() + 1);
        activations.push(inputs.to_vec());
        for layer in &self.layers {
            let next = activations[activations.len() - 1]
                .iter()
                .map(|row| layer.forward(row))
                .collect();
            activations.push(next);
        }

        let elements = (n * FEATURE_COUNT) as f64;
        let outputs = &activations[self.layers.len()];
        let mut loss = 0.0;
        let mut delta: Vec<Vec<f64>> = outputs
            .iter()
            .zip(inputs)
            .map(|(out, target)| {
                out.iter()
                    .zip(target)
                    .map(|(o, x)| {
                        loss += (o - x).powi(2);
                        2.0 * (o - x) / elements
                    })
                    .collect()
            })
            .collect();
        loss /= elements;

        for (l, layer) in self.layers.iter_mut().enumerate().rev() {
            let layer_in = &activations[l];
            let layer_out = &activations[l + 1];

            if layer.relu {
                for (d_row, out_row) in delta.iter_mut().zip(layer_out) {
                    for (d, out) in d_row.iter_mut().zip(out_row) {
                        if *out <= 0.0 {
                            *d = 0.0;
                        }
                    }
                }
            }

            let mut grad_w = vec![0.0; layer.weights.len()];
            let mut grad_b = vec![0.0; layer.bias.len()];
            for (d_row, in_row) in delta.iter().zip(layer_in) {
                for (o, d) in d_row.iter().enumerate() {
                    grad_b[o] += d;
                    for (i, x) in in_row.iter().enumerate() {
                        grad_w[o * layer.inputs + i] += d * x;
                    }
                }
            }

            // Propagate before the weights move
            if l > 0 {
                delta = delta
                    .iter()
                    .map(|d_row| {
                        (0..layer.inputs)
                            .map(|i| {
                                d_row
                                    .iter()
                                    .enumerate()
                                    .map(|(o, d)| d * layer.weights[o * layer.inputs + i])
                                    .sum::<f64>()
                            })
                            .collect()
                    })
                    .collect();
            }

            let (w_moments, b_moments) = &mut moments[l];
            w_moments.step(&mut layer.weights, &grad_w, lr, t);
            b_moments.step(&mut layer.bias, &grad_b, lr, t);
        }

        loss
    }

    fn reconstruct(&self, input: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(input.to_vec(), |acc, layer| layer.forward(&acc))
    }

    /// Mean squared error between the standardised row and its reconstruction
    #[must_use]
    pub fn reconstruction_error(&self, row: &FeatureVector) -> f64 {
        let input = self.scaler.transform(row);
        let output = self.reconstruct(&input);
        input
            .iter()
            .zip(&output)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            / FEATURE_COUNT as f64
    }
}

impl ScoreModel for Autoencoder {
    fn kind(&self) -> ModelKind {
        ModelKind::Reconstruction
    }

    fn score(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.par_iter()
            .map(|row| self.reconstruction_error(row))
            .collect()
    }
}
