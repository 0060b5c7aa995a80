//! Error types for the AutoMate ML training pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type for every pipeline stage
///
/// Stages never recover from these: the first error aborts the run and is
/// handed back to the caller as-is.
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid artifact name {0:?}: names must be non-empty and must not contain path separators or '..'")]
    EmptyName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Test set is empty, accuracy is undefined")]
    EmptyTestSet,

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Model artifact not found: {0}")]
    ModelNotFound(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
