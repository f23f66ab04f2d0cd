//! Output activations and the classification rule that goes with each of them.
use ndarray::{Array2, ArrayView2, Axis};
use std::fmt;

/// Trait for row-batched activation functions.
pub trait Activation: fmt::Debug + Send + Sync {
    /// Maps a `(n_examples, n_outputs)` block of logits to activations.
    fn apply(&self, z: ArrayView2<f64>) -> Array2<f64>;
}

/// Sigmoid: 1 / (1 + exp(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the sigmoid expressed through its own output: `s * (1 - s)`.
///
/// Only valid when `s` already holds sigmoid activations.
pub fn sigmoid_gradient(s: ArrayView2<f64>) -> Array2<f64> {
    s.mapv(|v| v * (1.0 - v))
}

/// Elementwise sigmoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply(&self, z: ArrayView2<f64>) -> Array2<f64> {
        z.mapv(sigmoid)
    }
}

/// Row-wise softmax.
///
/// `stable` subtracts each row's maximum before exponentiating. The raw form
/// overflows once a logit goes past ~709 and is kept only to reproduce
/// small-scale reference numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Softmax {
    pub stable: bool,
}

impl Softmax {
    pub fn stable() -> Self {
        Self { stable: true }
    }

    pub fn raw() -> Self {
        Self { stable: false }
    }
}

impl Default for Softmax {
    fn default() -> Self {
        Self::stable()
    }
}

impl Activation for Softmax {
    fn apply(&self, z: ArrayView2<f64>) -> Array2<f64> {
        let mut out = z.to_owned();
        for mut row in out.rows_mut() {
            let shift = if self.stable {
                row.fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            } else {
                0.0
            };
            row.mapv_inplace(|v| (v - shift).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        out
    }
}

/// Identity, for plain linear regression.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Activation for Linear {
    fn apply(&self, z: ArrayView2<f64>) -> Array2<f64> {
        z.to_owned()
    }
}

/// Serializable activation kinds, stored with a model's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Linear,
    Sigmoid,
    Softmax(Softmax),
}

impl ActivationKind {
    /// Turns activations into a label column.
    ///
    /// Single-column outputs are rounded to `{0, 1}` (ties go to the even
    /// value, so exactly 0.5 becomes 0). Multi-column outputs and every
    /// softmax output become the row-wise arg-max index.
    pub fn classify(&self, activations: ArrayView2<f64>) -> Array2<f64> {
        match self {
            ActivationKind::Softmax(_) => argmax_rows(activations),
            _ if activations.ncols() == 1 => activations.mapv(f64::round_ties_even),
            _ => argmax_rows(activations),
        }
    }
}

impl Activation for ActivationKind {
    fn apply(&self, z: ArrayView2<f64>) -> Array2<f64> {
        match self {
            ActivationKind::Linear => Linear.apply(z),
            ActivationKind::Sigmoid => Sigmoid.apply(z),
            ActivationKind::Softmax(softmax) => softmax.apply(z),
        }
    }
}

/// Index of the largest entry of every row, as an `(n, 1)` column.
///
/// Ties resolve to the first occurrence.
pub fn argmax_rows(m: ArrayView2<f64>) -> Array2<f64> {
    let indices = m.map_axis(Axis(1), |row| {
        row.iter()
            .enumerate()
            .fold(0usize, |max_i, (i, &v)| if v > row[max_i] { i } else { max_i }) as f64
    });
    indices.insert_axis(Axis(1))
}
