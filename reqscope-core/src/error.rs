//! Error types for reqscope-core

use thiserror::Error;

/// Main error type for the reqscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(String),

    /// A query parameter could not be turned into a filter
    #[error("{0}")]
    InvalidFilter(String),

    /// A blocking storage task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than by storage.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::InvalidFilter(_))
    }
}

/// Result type alias for reqscope-core
pub type Result<T> = std::result::Result<T, Error>;
