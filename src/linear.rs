//! Linear regression: `x · weight (+ bias)`, trained on mean squared error.
use ndarray::{Array2, ArrayView2, Axis};

use crate::activations::ActivationKind;
use crate::error::{MlError, Result};
use crate::init;
use crate::loss;
use crate::model::Model;

/// Linear model with an optional separate bias row.
///
/// `params[0]` is the `(n_features, n_outputs)` weight; `params[1]`, when
/// present, is a `(1, n_outputs)` bias broadcast over every example. Leave
/// the bias out when `x` already carries a column of ones.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    params: Vec<Array2<f64>>,
}

impl LinearRegression {
    /// Zero-initialised model.
    pub fn zeros(n_features: usize, n_outputs: usize, with_bias: bool) -> Self {
        let mut params = vec![init::zeros(n_features, n_outputs)];
        if with_bias {
            params.push(init::zeros(1, n_outputs));
        }
        Self { params }
    }

    /// Rebuilds a model from a weight and an optional bias row.
    pub fn from_params(params: Vec<Array2<f64>>) -> Result<Self> {
        match params.as_slice() {
            [_] => {}
            [w, b] => {
                MlError::check_size("bias rows", "one", b.nrows(), 1)?;
                MlError::check_size("bias columns", "weight columns", b.ncols(), w.ncols())?;
            }
            _ => {
                return Err(MlError::InvalidConfig(format!(
                    "linear regression takes a weight and an optional bias, got {} matrices",
                    params.len()
                )))
            }
        }
        Ok(Self { params })
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.params[0]
    }

    pub fn bias(&self) -> Option<&Array2<f64>> {
        self.params.get(1)
    }
}

impl Model for LinearRegression {
    fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let w = self.weight();
        MlError::check_size("input columns", "weight rows", x.ncols(), w.nrows())?;
        let mut pred = x.dot(w);
        if let Some(b) = self.bias() {
            pred += b;
        }
        Ok(pred)
    }

    fn loss(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64> {
        let pred = self.forward(x)?;
        loss::mse(pred.view(), y)
    }

    /// Residual gradient `xᵗ·(ŷ - y) / n`; the bias gets the mean residual.
    ///
    /// This is exactly half the derivative of [`loss::mse`]; the factor of 2
    /// is absorbed by the learning rate.
    fn gradient(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Vec<Array2<f64>>> {
        let pred = self.forward(x)?;
        let mut grads = vec![loss::residual_gradient(x, pred.view(), y)?];
        if self.bias().is_some() {
            let residual = &pred - &y;
            let n = residual.nrows() as f64;
            grads.push((residual.sum_axis(Axis(0)) / n).insert_axis(Axis(0)));
        }
        Ok(grads)
    }

    fn classify(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let pred = self.forward(x)?;
        Ok(ActivationKind::Linear.classify(pred.view()))
    }

    fn params(&self) -> &[Array2<f64>] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [Array2<f64>] {
        &mut self.params
    }
}
