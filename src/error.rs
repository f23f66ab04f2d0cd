//! Error type shared by the decoder, the models and the training loop.
use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, MlError>;

/// Every way a decode, a training run or an evaluation can fail.
#[derive(Debug)]
pub enum MlError {
    FileNotFound {
        path: PathBuf,
    },
    Io(io::Error),
    Csv(csv::Error),
    InvalidHeader(String),
    PayloadSize {
        expected: usize,
        got: usize,
    },
    Parse {
        line: usize,
        token: String,
    },
    EmptyDataset,
    RaggedRows {
        row: usize,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidConfig(String),
    UnknownClass(f64),
    NonFinite(&'static str),
    Persistence(String),
}

impl MlError {
    /// Shorthand for the most common shape check.
    pub(crate) fn check_size(
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    ) -> Result<()> {
        if got != expected {
            return Err(MlError::ShapeMismatch {
                a,
                b,
                got,
                expected,
            });
        }
        Ok(())
    }

    /// Maps `NotFound` to [`MlError::FileNotFound`], anything else to [`MlError::Io`].
    pub(crate) fn from_open(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => MlError::FileNotFound { path: path.into() },
            _ => MlError::Io(err),
        }
    }
}

impl Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::FileNotFound { path } => write!(f, "file not found: {}", path.display()),
            MlError::Io(e) => write!(f, "i/o error: {e}"),
            MlError::Csv(e) => write!(f, "malformed text dataset: {e}"),
            MlError::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            MlError::PayloadSize { expected, got } => write!(
                f,
                "payload has {got} bytes but the header announces {expected}"
            ),
            MlError::Parse { line, token } => {
                write!(f, "line {line}: cannot parse {token:?} as a number")
            }
            MlError::EmptyDataset => write!(f, "dataset has no examples"),
            MlError::RaggedRows { row, got, expected } => write!(
                f,
                "row {row} has {got} values, expected {expected} like the first row"
            ),
            MlError::ShapeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            MlError::UnknownClass(label) => write!(f, "label {label} is not in the class list"),
            MlError::NonFinite(what) => write!(f, "{what} contains NaN or infinite values"),
            MlError::Persistence(msg) => write!(f, "cannot (de)serialize parameters: {msg}"),
        }
    }
}

impl Error for MlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlError::Io(e) => Some(e),
            MlError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlError {
    fn from(err: io::Error) -> Self {
        MlError::Io(err)
    }
}

impl From<csv::Error> for MlError {
    fn from(err: csv::Error) -> Self {
        MlError::Csv(err)
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::Persistence(err.to_string())
    }
}
