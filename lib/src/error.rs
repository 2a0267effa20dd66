//! Error type shared by every pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, transforming, training on or evaluating jets.
#[derive(Debug, Error)]
pub enum QgError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A record in an input file could not be decoded.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A jet whose per-constituent arrays disagree in length.
    #[error("inconsistent jet record: {branch} has {got} entries, expected {expected}")]
    InconsistentRecord {
        branch: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("empty data: {0}")]
    EmptyData(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("plot error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, QgError>;
