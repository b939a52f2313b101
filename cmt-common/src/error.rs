//! Common error types for CMT

use thiserror::Error;

/// Common result type for CMT operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the toolkit
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted migration state is unreadable or inconsistent
    #[error("State error: {0}")]
    State(String),

    /// Invalid user input or source data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
