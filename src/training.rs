//! Training loops.
//!
//! - [`gradient_descent`]: fixed iteration count, `param -= gradient * learning_rate`.
//! - [`coordinate_search`]: derivative-free hill climbing that commits the
//!   first move that lowers the loss and stops once no move does.
//!
//! Both validate their [`TrainConfig`] before touching the model and record a
//! [`Progress`] entry per iteration.
use log::{info, warn};
use ndarray::Array2;
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::datasets::Dataset;
use crate::error::{MlError, Result};
use crate::linear::LinearRegression;
use crate::logistic::LogisticRegression;
use crate::metrics::evaluate;
use crate::model::Model;
use crate::network::TwoLayerNetwork;

fn default_report_every() -> usize {
    1
}

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    /// Log every n-th progress record. Every record is kept in the report.
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// Hidden units, two-layer network only.
    #[serde(default)]
    pub hidden_size: Option<usize>,
    /// Seed for weight initialisation.
    #[serde(default)]
    pub seed: u64,
}

impl TrainConfig {
    pub fn new(iterations: usize, learning_rate: f64) -> Self {
        Self {
            iterations,
            learning_rate,
            report_every: default_report_every(),
            hidden_size: None,
            seed: 0,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = Some(hidden_size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_report_every(mut self, report_every: usize) -> Self {
        self.report_every = report_every;
        self
    }

    /// Rejects settings no run can start with.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(MlError::InvalidConfig("iterations must be > 0".to_owned()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MlError::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if self.report_every == 0 {
            return Err(MlError::InvalidConfig("report_every must be > 0".to_owned()));
        }
        if self.hidden_size == Some(0) {
            return Err(MlError::InvalidConfig(
                "hidden layer size must be > 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MlError::from_open(e, path))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MlError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }
}

/// One progress record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: usize,
    pub loss: f64,
    /// Held-out accuracy in percent, when a test set was supplied.
    pub accuracy: Option<f64>,
}

/// What a training run observed along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub history: Vec<Progress>,
    /// Coordinate search ran out of improving moves before the budget did.
    pub stopped_early: bool,
}

impl TrainReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.history.last().map(|p| p.loss)
    }
}

struct Reporter<'a> {
    test: Option<&'a Dataset>,
    every: usize,
    history: Vec<Progress>,
}

impl<'a> Reporter<'a> {
    fn new(test: Option<&'a Dataset>, every: usize) -> Self {
        Self {
            test,
            every,
            history: Vec::new(),
        }
    }

    fn record<M: Model + ?Sized>(
        &mut self,
        model: &M,
        iteration: usize,
        loss: f64,
        force_log: bool,
    ) -> Result<()> {
        let accuracy = match self.test {
            Some(test) => Some(evaluate(model, test.x(), test.y())?.accuracy),
            None => None,
        };
        if force_log || iteration % self.every == 0 {
            match accuracy {
                Some(acc) => {
                    info!("Iteration: {iteration:5}, Loss: {loss:.8}, Accuracy: {acc:.2}%")
                }
                None => info!("Iteration: {iteration:5}, Loss: {loss:.8}"),
            }
        }
        self.history.push(Progress {
            iteration,
            loss,
            accuracy,
        });
        Ok(())
    }

    fn finish(self, stopped_early: bool) -> TrainReport {
        TrainReport {
            history: self.history,
            stopped_early,
        }
    }
}

/// `param -= gradient * learning_rate` for every parameter matrix.
fn apply_gradient(
    params: &mut [Array2<f64>],
    grads: &[Array2<f64>],
    learning_rate: f64,
) -> Result<()> {
    MlError::check_size("gradients", "parameters", grads.len(), params.len())?;
    for (p, g) in params.iter().zip(grads) {
        MlError::check_size("gradient rows", "parameter rows", g.nrows(), p.nrows())?;
        MlError::check_size("gradient columns", "parameter columns", g.ncols(), p.ncols())?;
    }
    for (p, g) in params.iter_mut().zip(grads) {
        p.zip_mut_with(g, |w, &d| *w -= d * learning_rate);
    }
    Ok(())
}

/// Full-batch gradient descent for `config.iterations` steps.
///
/// The history holds one record per iteration, taken before that
/// iteration's update, plus a final record after the last update.
pub fn gradient_descent<M: Model + ?Sized>(
    model: &mut M,
    train: &Dataset,
    test: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<TrainReport> {
    config.validate()?;
    let (x, y) = (train.x(), train.y());
    let mut reporter = Reporter::new(test, config.report_every);

    for iteration in 0..config.iterations {
        let loss = model.loss(x, y)?;
        reporter.record(&*model, iteration, loss, false)?;
        let grads = model.gradient(x, y)?;
        apply_gradient(model.params_mut(), &grads, config.learning_rate)?;
    }

    let loss = model.loss(x, y)?;
    reporter.record(&*model, config.iterations, loss, true)?;
    Ok(reporter.finish(false))
}

/// Tries `+step` then `-step` on each parameter entry in order and keeps the
/// first one that lowers the loss below `current`.
fn first_improving_move<M: Model + ?Sized>(
    model: &mut M,
    train: &Dataset,
    step: f64,
    current: f64,
) -> Result<bool> {
    for p in 0..model.params().len() {
        let cols = model.params()[p].ncols();
        for flat in 0..model.params()[p].len() {
            let at = [flat / cols, flat % cols];
            let original = model.params()[p][at];
            for candidate in [original + step, original - step] {
                model.params_mut()[p][at] = candidate;
                match model.loss(train.x(), train.y()) {
                    Ok(loss) if loss < current => return Ok(true),
                    Ok(_) => {}
                    Err(e) => {
                        model.params_mut()[p][at] = original;
                        return Err(e);
                    }
                }
            }
            model.params_mut()[p][at] = original;
        }
    }
    Ok(false)
}

/// Derivative-free hill climbing with step `config.learning_rate`.
///
/// For a weight and a bias the move order is weight+, weight-, bias+,
/// bias-. Stops early, with `stopped_early` set, once no move lowers the loss.
pub fn coordinate_search<M: Model + ?Sized>(
    model: &mut M,
    train: &Dataset,
    config: &TrainConfig,
) -> Result<TrainReport> {
    config.validate()?;
    let mut reporter = Reporter::new(None, config.report_every);

    for iteration in 0..config.iterations {
        let current = model.loss(train.x(), train.y())?;
        reporter.record(&*model, iteration, current, false)?;
        if !first_improving_move(model, train, config.learning_rate, current)? {
            info!("no improving move left after {iteration} iterations");
            return Ok(reporter.finish(true));
        }
    }

    warn!(
        "coordinate search did not converge within {} iterations",
        config.iterations
    );
    Ok(reporter.finish(false))
}

/// Linear regression with a separate bias, from zeros, by coordinate search.
pub fn train_linear(
    train: &Dataset,
    config: &TrainConfig,
) -> Result<(LinearRegression, TrainReport)> {
    config.validate()?;
    let mut model = LinearRegression::zeros(train.x().ncols(), train.y().ncols(), true);
    let report = coordinate_search(&mut model, train, config)?;
    Ok((model, report))
}

/// Single-layer classifier from zeros, by gradient descent.
///
/// `train.x()` must already be bias-augmented. One label column trains a
/// sigmoid output; one-hot labels train a softmax output.
pub fn train_classifier(
    train: &Dataset,
    test: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<(LogisticRegression, TrainReport)> {
    config.validate()?;
    let mut model = LogisticRegression::zeros(train.x().ncols(), train.y().ncols());
    let report = gradient_descent(&mut model, train, test, config)?;
    Ok((model, report))
}

/// Two-layer network from a seeded random draw, by gradient descent.
///
/// `config.hidden_size` is required; `train.y()` must be one-hot.
pub fn train_network(
    train: &Dataset,
    test: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<(TwoLayerNetwork, TrainReport)> {
    config.validate()?;
    let n_hidden = config.hidden_size.ok_or_else(|| {
        MlError::InvalidConfig("a two-layer network needs hidden_size".to_owned())
    })?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut model = TwoLayerNetwork::new(train.x().ncols(), n_hidden, train.y().ncols(), &mut rng)?;
    let report = gradient_descent(&mut model, train, test, config)?;
    Ok((model, report))
}
