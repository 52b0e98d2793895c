use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Canonical store error: {0}")]
    Store(String),

    #[error("Column error: {0}")]
    Column(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
