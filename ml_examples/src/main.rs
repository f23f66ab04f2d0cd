// ml_examples/src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use descent_ml::{
    datasets::{scale, split_columns},
    confusion_matrix, evaluate, load_mnist, load_text, one_hot, prepend_bias, save_params,
    train_classifier, train_linear, train_network, Dataset, Model, Split, TrainConfig,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(about = "Train the example models")]
struct Cli {
    /// JSON training config; flags below override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, value_name = "INT")]
    iterations: Option<usize>,
    #[arg(short, long, global = true, value_name = "FLOAT")]
    learning_rate: Option<f64>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Coordinate-search linear regression; the last column is the target
    Linear {
        #[arg(short, long, value_name = "PATH")]
        data: PathBuf,
    },
    /// Logistic regression; the last column is a 0/1 label
    Logistic {
        #[arg(short, long, value_name = "PATH")]
        data: PathBuf,
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },
    /// Two-layer network on the gzipped MNIST files in DIR
    Mnist {
        #[arg(short, long, value_name = "DIR", default_value = "data")]
        dir: PathBuf,
        #[arg(long, value_name = "INT")]
        hidden: Option<usize>,
        /// Write the trained weights here
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
}

impl Cli {
    fn train_config(&self, iterations: usize, learning_rate: f64) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::new(iterations, learning_rate),
        };
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn table(path: &Path) -> Result<(ndarray::Array2<f64>, ndarray::Array2<f64>)> {
    let data = load_text(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(split_columns(data.view(), data.ncols().saturating_sub(1))?)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Linear { data } => {
            let (x, y) = table(data)?;
            let config = cli.train_config(10_000, 0.01)?;
            let (model, report) = train_linear(&Dataset::new(x, y)?, &config)?;
            println!("weight = {}", model.weight());
            if let Some(bias) = model.bias() {
                println!("bias = {bias}");
            }
            println!(
                "stopped early: {}, final loss: {:.8}",
                report.stopped_early,
                report.final_loss().unwrap_or(f64::NAN)
            );
        }
        Command::Logistic {
            data,
            test_fraction,
        } => {
            let (x, y) = table(data)?;
            let config = cli.train_config(10_000, 0.001)?;
            let all = Dataset::new(prepend_bias(x.view()), y)?;
            let (train, test) = all.split(*test_fraction, config.seed)?;
            let (model, _) = train_classifier(&train, Some(&test), &config)?;
            println!("weight = {}", model.weight());
            println!("held-out: {}", evaluate(&model, test.x(), test.y())?);
        }
        Command::Mnist { dir, hidden, save } => {
            let mut config = cli.train_config(100, 0.5)?;
            config.hidden_size = hidden.or(config.hidden_size).or(Some(200));

            let classes: Vec<f64> = (0..10).map(f64::from).collect();
            let (train_x, train_y) = load_mnist(dir, Split::Train)
                .context("loading the MNIST training set")?
                .into_parts();
            let (test_x, test_y) = load_mnist(dir, Split::Test)
                .context("loading the MNIST test set")?
                .into_parts();
            info!("loaded {} training and {} test images", train_x.nrows(), test_x.nrows());

            let train = Dataset::new(
                scale(train_x.view(), 255.0),
                one_hot(train_y.view(), &classes)?,
            )?;
            let test = Dataset::new(scale(test_x.view(), 255.0), test_y)?;

            let (model, _) = train_network(&train, Some(&test), &config)?;
            println!("{model}");
            println!("test set: {}", evaluate(&model, test.x(), test.y())?);
            for (class, row) in confusion_matrix(&model, test.x(), test.y(), classes.len())?
                .iter()
                .enumerate()
            {
                println!("{class}: {row:?}");
            }

            if let Some(path) = save {
                save_params(path, model.params())
                    .with_context(|| format!("saving weights to {}", path.display()))?;
                println!("weights saved to {}", path.display());
            }
        }
    }

    Ok(())
}
