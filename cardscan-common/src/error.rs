//! Common error types for cardscan

use thiserror::Error;

/// Common result type for cardscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the scan pipeline itself (config files, keys, I/O)
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
