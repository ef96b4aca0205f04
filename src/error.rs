//! Error types for Cadence Flux
//!
//! Timestamp parse failures are not errors at this level: they are carried as
//! [`ParseFailure`](crate::types::ParseFailure) values and degrade a single
//! record. `CadenceError` covers the record source, encoders and configuration.

use thiserror::Error;

/// Errors raised around the classification core
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid feed pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
