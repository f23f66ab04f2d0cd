//! The interface every trainable model exposes to the training loop and the evaluator.
use ndarray::{Array2, ArrayView2};

use crate::error::Result;

/// A forward model with a scalar loss and its exact gradient.
///
/// Parameters are an ordered list of matrices. The order is part of the
/// contract: `gradient` returns one matrix per parameter, same order, same
/// shape, and coordinate search walks them in that order.
pub trait Model {
    /// Prediction for every row of `x`.
    fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Training loss of the current parameters on `(x, y)`.
    fn loss(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64>;

    /// Gradient of [`Model::loss`] with respect to each parameter matrix.
    ///
    /// Implementations may return a positive constant multiple of it;
    /// [`crate::LinearRegression`] returns half.
    fn gradient(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Vec<Array2<f64>>>;

    /// Label column `(n_examples, 1)` for every row of `x`.
    fn classify(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn params(&self) -> &[Array2<f64>];

    fn params_mut(&mut self) -> &mut [Array2<f64>];

    /// Copies the parameter set out, e.g. for persistence.
    fn to_params(&self) -> Vec<Array2<f64>> {
        self.params().to_vec()
    }
}
