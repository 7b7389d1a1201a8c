// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProgressError>;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown stage '{stage}' has no catalog entry or alias")]
    UnknownStage { stage: String },

    #[error("Catalog mismatch: expected catalog {expected}, found {found}")]
    CatalogMismatch { expected: String, found: String },

    #[error("Empty table: {0}")]
    EmptyTable(String),

    #[error("No tables supplied to combine")]
    NothingToCombine,

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid count '{value}' for stage '{stage}' in period '{period}'")]
    InvalidValue {
        stage: String,
        period: String,
        value: String,
    },

    #[error("Count for stage '{stage}' in period '{period}' exceeds the supported range")]
    CountOverflow { stage: String, period: String },

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source for site '{site}' not found at {path}")]
    MissingSource { site: String, path: PathBuf },

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        ProgressError::Serialization(err.to_string())
    }
}
