//! Error types for sysidexpr
//!
//! Every variant names the offending configuration field, subject id or
//! candidate index so a failed run can be traced back to its input.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// sysidexpr error types
#[derive(Error, Debug)]
pub enum Error {
    /// A declared column or configuration field does not match the data
    #[error("Configuration error in `{field}`: {reason}")]
    Configuration {
        /// Name of the column or configuration field at fault
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Ground truth and prediction cannot be compared for a subject
    #[error("Subject mismatch for `{subject}`: {reason}")]
    Mismatch {
        /// Subject id at fault
        subject: String,
        /// What differs between the two sides
        reason: String,
    },

    /// No finite value is left to report: every error total of a loss, or
    /// every candidate score of a tuning run, is NaN
    #[error("Every error total or candidate score is NaN for metric `{metric}`\nRefusing to report NaN as a score")]
    AllNaN {
        /// Metric being computed
        metric: String,
    },

    /// Tuner invoked without any hyperparameter candidates
    #[error("No hyperparameter candidates supplied to the tuner")]
    EmptyCandidates,

    /// Candidates reported metrics with different optimization directions
    #[error("Inconsistent metric at candidate {index}: expected `{expected}`, found `{found}`")]
    InconsistentMetric {
        /// Index of the offending candidate
        index: usize,
        /// Metric reported by the first candidate
        expected: String,
        /// Metric reported by the offending candidate
        found: String,
    },

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (Parquet/Arrow sources)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] naming `field`.
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Mismatch`] naming `subject`.
    pub fn mismatch(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mismatch {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}
