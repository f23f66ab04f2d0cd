//! A small crate for learning supervised classifiers by gradient descent:
//! linear regression, logistic regression / softmax perceptron, and a
//! two-layer network, plus the dataset plumbing they share.
//!
//! - IDX (MNIST-style, optionally gzipped) and delimited-text loaders
//! - Bias augmentation, min-max normalization, binarization, one-hot encoding
//! - Full-batch gradient descent and a coordinate-search baseline
//! - Accuracy / confusion-matrix evaluation and parameter persistence

pub mod activations;
pub mod datasets;
pub mod error;
pub mod init;
pub mod linear;
pub mod logistic;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod network;
pub mod persistence;
pub mod training;

pub use activations::{ActivationKind, Softmax};
pub use datasets::{
    binarize, load_idx, load_mnist, load_text, min_max_normalize, one_hot, prepend_bias, Dataset,
    Split,
};
pub use error::{MlError, Result};
pub use linear::LinearRegression;
pub use logistic::LogisticRegression;
pub use metrics::{confusion_matrix, evaluate, Evaluation};
pub use model::Model;
pub use network::TwoLayerNetwork;
pub use persistence::{load_params, save_params};
pub use training::{
    coordinate_search, gradient_descent, train_classifier, train_linear, train_network, Progress,
    TrainConfig, TrainReport,
};
