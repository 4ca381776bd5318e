//! Error types for fault localization
//!
//! Library code returns `SflError`; the pipeline and CLI wrap it with
//! `anyhow` context at the application boundary.

use thiserror::Error;

/// Errors raised by the localization core
#[derive(Error, Debug)]
pub enum SflError {
    #[error("Invalid corpus line {line}: {reason}")]
    CorpusFormat { line: usize, reason: String },

    #[error("Invalid coverage record '{record}': {reason}")]
    CoverageFormat { record: String, reason: String },

    #[error("{formula} has a zero denominator for statement {statement}")]
    ZeroDenominator { formula: String, statement: String },

    #[error("Configuration search failed: {0}")]
    Search(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for the localization core
pub type SflResult<T> = Result<T, SflError>;
