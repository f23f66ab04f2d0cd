//! Two-layer network: sigmoid hidden layer, softmax output, trained by backpropagation.
use ndarray::{s, Array2, ArrayView2};
use rand::Rng;
use std::fmt;

use crate::activations::{sigmoid_gradient, Activation, ActivationKind, Sigmoid, Softmax};
use crate::datasets::prepend_bias;
use crate::error::{MlError, Result};
use crate::init;
use crate::loss;
use crate::model::Model;

/// `params[0]` is the hidden weight `(n_inputs + 1, n_hidden)`, `params[1]`
/// the output weight `(n_hidden + 1, n_outputs)`. Row 0 of each multiplies
/// the bias column the layer prepends to its input.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLayerNetwork {
    params: Vec<Array2<f64>>,
    output: Softmax,
}

impl TwoLayerNetwork {
    /// Random initialisation, see [`init::scaled_normal`].
    pub fn new<R: Rng + ?Sized>(
        n_inputs: usize,
        n_hidden: usize,
        n_outputs: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if n_hidden == 0 {
            return Err(MlError::InvalidConfig(
                "hidden layer size must be > 0".to_owned(),
            ));
        }
        let w1 = init::scaled_normal(n_inputs + 1, n_hidden, rng)?;
        let w2 = init::scaled_normal(n_hidden + 1, n_outputs, rng)?;
        Self::from_params(vec![w1, w2])
    }

    /// Rebuilds a network from its two weight matrices, checking that they chain.
    pub fn from_params(params: Vec<Array2<f64>>) -> Result<Self> {
        let [w1, w2] = params.as_slice() else {
            return Err(MlError::InvalidConfig(format!(
                "a two-layer network has two weight matrices, got {}",
                params.len()
            )));
        };
        if w1.nrows() < 2 || w1.ncols() == 0 || w2.ncols() == 0 {
            return Err(MlError::InvalidConfig(format!(
                "degenerate weights: {:?} and {:?}",
                w1.dim(),
                w2.dim()
            )));
        }
        MlError::check_size("output weight rows", "hidden units + 1", w2.nrows(), w1.ncols() + 1)?;
        Ok(Self {
            params,
            output: Softmax::stable(),
        })
    }

    /// Switches the output softmax between its stable and raw forms.
    pub fn with_softmax(mut self, output: Softmax) -> Self {
        self.output = output;
        self
    }

    pub fn hidden_weight(&self) -> &Array2<f64> {
        &self.params[0]
    }

    pub fn output_weight(&self) -> &Array2<f64> {
        &self.params[1]
    }

    pub fn n_hidden(&self) -> usize {
        self.hidden_weight().ncols()
    }

    /// Returns `(y_hat, hidden)`; backpropagation needs both.
    pub fn forward_with_hidden(&self, x: ArrayView2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        let w1 = self.hidden_weight();
        MlError::check_size("input columns + 1", "hidden weight rows", x.ncols() + 1, w1.nrows())?;
        let hidden = Sigmoid.apply(prepend_bias(x).dot(w1).view());
        let y_hat = self
            .output
            .apply(prepend_bias(hidden.view()).dot(self.output_weight()).view());
        Ok((y_hat, hidden))
    }

    /// Gradients of the cross-entropy for both layers.
    ///
    /// The bias row of the output weight is dropped when the error flows back,
    /// since no hidden unit feeds it.
    pub fn backprop(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        y_hat: ArrayView2<f64>,
        hidden: ArrayView2<f64>,
    ) -> Result<Vec<Array2<f64>>> {
        MlError::check_size("input rows", "hidden rows", x.nrows(), hidden.nrows())?;
        let w1 = self.hidden_weight();
        MlError::check_size("input columns + 1", "hidden weight rows", x.ncols() + 1, w1.nrows())?;
        MlError::check_size("hidden columns", "hidden units", hidden.ncols(), self.n_hidden())?;
        let outputs = self.output_weight().ncols();
        MlError::check_size("prediction columns", "output weight columns", y_hat.ncols(), outputs)?;
        let w2_gradient = loss::residual_gradient(prepend_bias(hidden).view(), y_hat, y)?;

        let n = x.nrows() as f64;
        let residual = &y_hat - &y;
        let w2_unbiased = self.output_weight().slice(s![1.., ..]);
        let delta = residual.dot(&w2_unbiased.t()) * sigmoid_gradient(hidden);
        let w1_gradient = prepend_bias(x).t().dot(&delta) / n;

        Ok(vec![w1_gradient, w2_gradient])
    }
}

impl Model for TwoLayerNetwork {
    fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.forward_with_hidden(x).map(|(y_hat, _)| y_hat)
    }

    fn loss(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<f64> {
        let y_hat = self.forward(x)?;
        loss::cross_entropy(y_hat.view(), y)
    }

    fn gradient(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Vec<Array2<f64>>> {
        let (y_hat, hidden) = self.forward_with_hidden(x)?;
        self.backprop(x, y, y_hat.view(), hidden.view())
    }

    fn classify(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let y_hat = self.forward(x)?;
        Ok(ActivationKind::Softmax(self.output).classify(y_hat.view()))
    }

    fn params(&self) -> &[Array2<f64>] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [Array2<f64>] {
        &mut self.params
    }
}

impl fmt::Display for TwoLayerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TwoLayerNetwork: [{}, {}, {}]",
            self.hidden_weight().nrows() - 1,
            self.n_hidden(),
            self.output_weight().ncols()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn small_problem() -> (Array2<f64>, Array2<f64>) {
        let x = array![
            [0.2, -0.4, 0.9],
            [0.5, 0.1, -0.3],
            [-0.7, 0.8, 0.2],
            [0.0, -0.2, -0.6],
            [0.9, 0.4, 0.1],
            [-0.3, -0.9, 0.5],
        ];
        let y = array![
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 1.0],
            [1.0, 0.0],
        ];
        (x, y)
    }

    #[test]
    fn shapes_chain_through_both_layers() {
        let net = TwoLayerNetwork::new(3, 4, 2, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(net.hidden_weight().dim(), (4, 4));
        assert_eq!(net.output_weight().dim(), (5, 2));
        assert_eq!(net.to_string(), "TwoLayerNetwork: [3, 4, 2]");

        let (x, _) = small_problem();
        let (y_hat, hidden) = net.forward_with_hidden(x.view()).unwrap();
        assert_eq!(y_hat.dim(), (6, 2));
        assert_eq!(hidden.dim(), (6, 4));
        for row in y_hat.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn backprop_agrees_with_finite_differences() {
        let (x, y) = small_problem();
        let net = TwoLayerNetwork::new(3, 3, 2, &mut StdRng::seed_from_u64(42)).unwrap();
        let grads = net.gradient(x.view(), y.view()).unwrap();

        let eps = 1e-5;
        for (layer, grad) in grads.iter().enumerate() {
            assert_eq!(grad.dim(), net.params()[layer].dim());
            for ((r, c), &g) in grad.indexed_iter() {
                let mut plus = net.clone();
                plus.params_mut()[layer][[r, c]] += eps;
                let mut minus = net.clone();
                minus.params_mut()[layer][[r, c]] -= eps;
                let numeric = (plus.loss(x.view(), y.view()).unwrap()
                    - minus.loss(x.view(), y.view()).unwrap())
                    / (2.0 * eps);
                assert_abs_diff_eq!(g, numeric, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn backprop_rejects_inputs_from_another_batch() {
        let (x, y) = small_problem();
        let net = TwoLayerNetwork::new(3, 3, 2, &mut StdRng::seed_from_u64(7)).unwrap();
        let (y_hat, hidden) = net.forward_with_hidden(x.slice(s![..2, ..])).unwrap();

        let err = net
            .backprop(x.view(), y.slice(s![..2, ..]), y_hat.view(), hidden.view())
            .unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { .. }));

        let other = TwoLayerNetwork::new(3, 4, 2, &mut StdRng::seed_from_u64(7)).unwrap();
        let (y_hat, hidden) = other.forward_with_hidden(x.view()).unwrap();
        let err = net
            .backprop(x.view(), y.view(), y_hat.view(), hidden.view())
            .unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { .. }));
    }

    #[test]
    fn zero_hidden_units_are_rejected() {
        let err = TwoLayerNetwork::new(3, 0, 2, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, MlError::InvalidConfig(_)));
    }

    #[test]
    fn weights_that_do_not_chain_are_rejected() {
        let w1 = Array2::zeros((4, 3));
        let w2 = Array2::zeros((3, 2));
        assert!(TwoLayerNetwork::from_params(vec![w1, w2]).is_err());
    }

    #[test]
    fn wrong_input_width_is_a_shape_error() {
        let net = TwoLayerNetwork::new(3, 2, 2, &mut StdRng::seed_from_u64(0)).unwrap();
        let err = net.forward(array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { .. }));
    }
}
