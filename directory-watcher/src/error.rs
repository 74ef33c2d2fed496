//! Error types for the directory watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the directory watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Backend was started twice or used after stop.
    #[error("backend error: {0}")]
    Backend(String),

    /// The rebuild callback returned an error or panicked.
    #[error("rebuild failed for batch {sequence}: {message}")]
    Rebuild { sequence: u64, message: String },

    /// Failed to spawn the scheduler thread.
    #[error("failed to spawn scheduler: {0}")]
    Spawn(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
