//! Pipeline error types.

use thiserror::Error;

/// Errors raised while loading, aggregating or labeling revenue data.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A `value` field could not be read as a number.
    #[error("Type conversion error at row {row}: cannot interpret {value:?} as a number")]
    TypeConversion { row: usize, value: String },

    #[error("Empty input: the aggregate table has no rows")]
    EmptyInput,

    #[error("Insufficient data: required {required}, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("Detector not fitted: call fit() before scoring")]
    NotFitted,

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing column: {0:?} not found in header")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
