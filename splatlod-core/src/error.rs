//! Error types for splatlod

use thiserror::Error;

/// Main error type for splatlod operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reduction parameter is outside its accepted range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Records disagree with the attribute schema of their point set.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for splatlod operations
pub type Result<T> = std::result::Result<T, Error>;
