//! Parameter initialisers.
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;

use crate::error::{MlError, Result};

/// All-zero matrix of the given shape.
pub fn zeros(rows: usize, cols: usize) -> Array2<f64> {
    Array2::zeros((rows, cols))
}

/// Normal draw with mean 0 and standard deviation `sqrt(1 / rows)`.
///
/// `rows` is the fan-in of the layer (bias row included), which keeps the
/// initial logits of a sigmoid layer close to zero.
pub fn scaled_normal<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if rows == 0 || cols == 0 {
        return Err(MlError::InvalidConfig(format!(
            "cannot initialise a {rows}x{cols} weight matrix"
        )));
    }
    let std_dev = (1.0 / rows as f64).sqrt();
    let normal = Normal::new(0.0, std_dev).map_err(|e| MlError::InvalidConfig(e.to_string()))?;
    Ok(Array2::random_using((rows, cols), normal, rng))
}
