//! Error types.
//!
//! `ConfigError` covers startup problems that abort the run before any
//! subject is analyzed. `AnalysisError` covers per-subject failures, which
//! the batch runner records and reports without stopping.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid data folder path: {}", .0.display())]
    InvalidDataDir(PathBuf),

    #[error("Invalid participant info file path: {}", .0.display())]
    MissingRoster(PathBuf),

    #[error("Participant info file must contain '{column}' column: {}", .path.display())]
    MissingIdColumn { path: PathBuf, column: &'static str },

    #[error("Failed to read participant info file {}: {source}", .path.display())]
    MalformedRoster {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Chunk size must be at least 1 row")]
    ZeroChunkSize,
}

/// Errors raised while analyzing a single subject.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("File {} not found for subject {subject}", .path.display())]
    NotFound { subject: String, path: PathBuf },

    #[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    Schema {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    #[error("Subject {subject} has no rows; means are undefined")]
    DivisionUndefined { subject: String },

    #[error("{}: row {row}: column {column} has non-numeric value '{value}'", .path.display())]
    InvalidValue {
        path: PathBuf,
        row: u64,
        column: &'static str,
        value: String,
    },

    #[error("{}: row {row} has {found} fields, header has {expected}", .path.display())]
    ExtraFields {
        path: PathBuf,
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Stable machine-readable name of the failure, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::NotFound { .. } => "not_found",
            AnalysisError::Schema { .. } => "schema",
            AnalysisError::DivisionUndefined { .. } => "division_undefined",
            AnalysisError::InvalidValue { .. } => "invalid_value",
            AnalysisError::ExtraFields { .. } => "extra_fields",
            AnalysisError::Csv(_) => "csv",
            AnalysisError::Io(_) => "io",
        }
    }
}
