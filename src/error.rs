// src/error.rs

//! Unified error handling for the sync application.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source dataset download failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Source payload violated the column contract
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Dataset storage failed
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Known-identity checkpoint I/O failed
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Source download failure. Fatal for the run; no state is touched.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, timeout, body read)
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server returned {status}")]
    Status { status: reqwest::StatusCode },
}

/// Malformed source payload. A single bad row fails the whole payload:
/// partial ingestion would corrupt the full-snapshot invariant.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A required column is absent from the header row
    #[error("missing required column '{column}' in header")]
    MissingColumn { column: &'static str },

    /// A data row is shorter than the column contract
    #[error("row at line {line} is missing field '{column}'")]
    MissingField { line: u64, column: &'static str },

    /// The payload is not parseable as CSV at all
    #[error("malformed CSV: {0}")]
    Malformed(#[from] csv::Error),
}

/// Dataset storage failure (I/O or constraint).
#[derive(Error, Debug)]
#[error("database error: {0}")]
pub struct PersistenceError(#[from] pub sqlx::Error);

/// Known-identity checkpoint failure, with the offending path.
#[derive(Error, Debug)]
#[error("checkpoint I/O failed for {}: {}", .path.display(), .source)]
pub struct CheckpointError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl CheckpointError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
