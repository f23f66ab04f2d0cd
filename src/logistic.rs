//! Single-layer classifier over `x · weight`: sigmoid (logistic regression)
//! or softmax (perceptron).
use ndarray::{Array2, ArrayView2};

use crate::activations::{Activation, ActivationKind, Softmax};
use crate::error::{MlError, Result};
use crate::init;
use crate::loss;
use crate::model::Model;

/// One weight matrix of shape `(n_features, n_outputs)`, no separate bias.
///
/// Inputs are expected to be bias-augmented already (see
/// [`crate::datasets::prepend_bias`]).
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    params: Vec<Array2<f64>>,
    output: ActivationKind,
}

impl LogisticRegression {
    /// Zero weights; sigmoid for a single output, stable softmax otherwise.
    pub fn zeros(n_features: usize, n_outputs: usize) -> Self {
        let output = if n_outputs == 1 {
            ActivationKind::Sigmoid
        } else {
            ActivationKind::Softmax(Softmax::stable())
        };
        Self {
            params: vec![init::zeros(n_features, n_outputs)],
            output,
        }
    }

    /// Uses `weight` as-is with the given output activation.
    pub fn with_output(weight: Array2<f64>, output: ActivationKind) -> Result<Self> {
        if output == ActivationKind::Linear {
            return Err(MlError::InvalidConfig(
                "a classifier needs a sigmoid or softmax output".to_owned(),
            ));
        }
        Ok(Self {
            params: vec![weight],
            output,
        })
    }

    /// Rebuilds a classifier from a saved parameter set.
    pub fn from_params(mut params: Vec<Array2<f64>>, output: ActivationKind) -> Result<Self> {
        if params.len() != 1 {
            return Err(MlError::InvalidConfig(format!(
                "a single-layer classifier has one weight matrix, got {}",
                params.len()
            )));
        }
        Self::with_output(params.remove(0), output)
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.params[0]
    }

    pub fn output(&self) -> ActivationKind {
        self.output
    }
}

impl Model for LogisticRegression {
    fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let w = self.weight();
        MlError::check_size("input columns", "weight rows", x.ncols(), w.nrows())?;
        Ok(self.output.apply(x.dot(w).view()))
    }

    fn loss(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64> {
        let pred = self.forward(x)?;
        match self.output {
            ActivationKind::Softmax(_) => loss::cross_entropy(pred.view(), y),
            _ => loss::log_loss(pred.view(), y),
        }
    }

    fn gradient(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Vec<Array2<f64>>> {
        let pred = self.forward(x)?;
        Ok(vec![loss::residual_gradient(x, pred.view(), y)?])
    }

    fn classify(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let pred = self.forward(x)?;
        Ok(self.output.classify(pred.view()))
    }

    fn params(&self) -> &[Array2<f64>] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [Array2<f64>] {
        &mut self.params
    }
}
