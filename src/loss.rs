//! Loss functions and the closed-form single-layer gradient.
use ndarray::{Array2, ArrayView2};

use crate::error::{MlError, Result};

/// Probabilities are clamped to `[EPS, 1 - EPS]` before taking logs.
const EPS: f64 = 1e-12;

fn check_same_shape(pred: ArrayView2<f64>, target: ArrayView2<f64>) -> Result<()> {
    MlError::check_size("predictions", "labels", pred.nrows(), target.nrows())?;
    MlError::check_size("prediction columns", "label columns", pred.ncols(), target.ncols())
}

fn clamp(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

/// Squared error summed over the output columns, averaged over examples.
pub fn mse(pred: ArrayView2<f64>, target: ArrayView2<f64>) -> Result<f64> {
    check_same_shape(pred, target)?;
    let residual = &pred - &target;
    Ok(residual.mapv(|d| d * d).sum() / residual.nrows() as f64)
}

/// Binary log loss per output column, summed over columns and averaged over
/// examples: `-sum(y·ln(p) + (1 - y)·ln(1 - p)) / n_examples`.
pub fn log_loss(pred: ArrayView2<f64>, target: ArrayView2<f64>) -> Result<f64> {
    check_same_shape(pred, target)?;
    let total: f64 = pred
        .iter()
        .zip(target.iter())
        .map(|(&p, &y)| {
            let p = clamp(p);
            y * p.ln() + (1.0 - y) * (1.0 - p).ln()
        })
        .sum();
    Ok(-total / pred.nrows() as f64)
}

/// Categorical cross-entropy against one-hot labels: `-sum(y·ln(p)) / n_examples`.
pub fn cross_entropy(pred: ArrayView2<f64>, target: ArrayView2<f64>) -> Result<f64> {
    check_same_shape(pred, target)?;
    let total: f64 = pred
        .iter()
        .zip(target.iter())
        .map(|(&p, &y)| y * clamp(p).ln())
        .sum();
    Ok(-total / pred.nrows() as f64)
}

/// `xᵗ·(pred - target) / n_examples`.
///
/// Both linear regression and sigmoid/softmax + log loss reduce to this
/// residual-times-input form for a single weight matrix.
pub fn residual_gradient(
    x: ArrayView2<f64>,
    pred: ArrayView2<f64>,
    target: ArrayView2<f64>,
) -> Result<Array2<f64>> {
    check_same_shape(pred, target)?;
    MlError::check_size("inputs", "predictions", x.nrows(), pred.nrows())?;
    let residual = &pred - &target;
    Ok(x.t().dot(&residual) / x.nrows() as f64)
}
