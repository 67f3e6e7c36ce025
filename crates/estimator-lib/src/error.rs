//! Error taxonomy for training, prediction and planning

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the estimation engine
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// Too few records, missing target column or empty inputs
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The design matrix does not have full column rank
    #[error("singular design matrix: rank {rank} < {columns} columns (collinear features or too few records)")]
    SingularDesign { rank: usize, columns: usize },

    #[error("invalid fold count {folds} for {records} records (need 2 <= folds <= records)")]
    InvalidFoldCount { folds: usize, records: usize },

    /// Negative, non-finite or out-of-range parameter
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("cycle time must be positive, got {0}")]
    ZeroCycleTime(f64),

    /// A required variable is absent and no proxy is configured for it
    #[error("missing feature `{0}` and no proxy mapping configured")]
    MissingFeature(String),

    /// Corrupt or partially present model artifact
    #[error("failed to load model artifact from {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EstimatorError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
