//! Error types for file selection and artifact rendering.

use thiserror::Error;

/// Result type alias for codefile operations.
pub type Result<T> = std::result::Result<T, CodefileError>;

/// Errors that can occur while selecting files or writing artifacts.
#[derive(Error, Debug)]
pub enum CodefileError {
    /// Root directory not found.
    #[error("root not found: {0}")]
    RootNotFound(String),

    /// Root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Invalid file exclusion regex.
    #[error("invalid exclude pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to write an artifact.
    #[error("failed to write {path}: {source}")]
    WriteArtifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
