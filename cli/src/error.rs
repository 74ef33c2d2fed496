//! Error types for the command-line front end.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur while managing the tracked set.
#[derive(Error, Debug)]
pub enum CliError {
    /// A path supplied by the user does not exist after normalisation.
    #[error("not found (normalized: {normalized}): {raw}")]
    PathNotFound { raw: String, normalized: String },

    /// A file was expected.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// A directory was expected.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Failed to read or write the manifest.
    #[error("manifest error at {path}: {message}")]
    Manifest { path: String, message: String },

    /// Failed to load settings.
    #[error("settings error at {path}: {message}")]
    Settings { path: String, message: String },

    /// Selection or rendering failed.
    #[error(transparent)]
    Codefile(#[from] codemanager_codefile::CodefileError),

    /// Watcher failed.
    #[error(transparent)]
    Watcher(#[from] codemanager_directory_watcher::WatcherError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
