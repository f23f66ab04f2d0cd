//! Metrics for evaluating a trained model on held-out data.
use ndarray::{Array2, ArrayView2};
use std::fmt;

use crate::activations::argmax_rows;
use crate::error::{MlError, Result};
use crate::model::Model;

/// Outcome of classifying a held-out set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub matches: usize,
    pub total: usize,
    /// `matches * 100 / total`, unrounded.
    pub accuracy: f64,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} correct ({:.2}%)",
            self.matches, self.total, self.accuracy
        )
    }
}

/// Reduces labels to a class column: one-hot rows become their index,
/// a single column is returned unchanged.
pub fn label_column(y: ArrayView2<f64>) -> Array2<f64> {
    if y.ncols() == 1 {
        y.to_owned()
    } else {
        argmax_rows(y)
    }
}

fn same_label(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Classifies `x` and counts exact matches against `y`.
pub fn evaluate<M: Model + ?Sized>(
    model: &M,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
) -> Result<Evaluation> {
    if x.nrows() == 0 {
        return Err(MlError::EmptyDataset);
    }
    MlError::check_size("label rows", "input rows", y.nrows(), x.nrows())?;
    let predicted = model.classify(x)?;
    let expected = label_column(y);

    let matches = predicted
        .iter()
        .zip(expected.iter())
        .filter(|&(&p, &t)| same_label(p, t))
        .count();
    let total = x.nrows();
    Ok(Evaluation {
        matches,
        total,
        accuracy: matches as f64 * 100.0 / total as f64,
    })
}

/// `cm[true_class][predicted_class]` counts, for labels in `0..num_classes`.
pub fn confusion_matrix<M: Model + ?Sized>(
    model: &M,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    num_classes: usize,
) -> Result<Vec<Vec<usize>>> {
    MlError::check_size("label rows", "input rows", y.nrows(), x.nrows())?;
    let predicted = model.classify(x)?;
    let expected = label_column(y);

    let mut cm = vec![vec![0; num_classes]; num_classes];
    for (&p, &t) in predicted.iter().zip(expected.iter()) {
        let class_index = |v: f64| {
            let i = v.round();
            if i >= 0.0 && (i as usize) < num_classes {
                Ok(i as usize)
            } else {
                Err(MlError::UnknownClass(v))
            }
        };
        cm[class_index(t)?][class_index(p)?] += 1;
    }
    Ok(cm)
}
