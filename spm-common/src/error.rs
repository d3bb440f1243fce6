//! Common error types for the portal

use thiserror::Error;

/// Common result type for portal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with the current state of a record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The user-facing message without the category prefix
    pub fn message(&self) -> String {
        match self {
            Error::Config(msg)
            | Error::NotFound(msg)
            | Error::InvalidInput(msg)
            | Error::Conflict(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Database(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
        }
    }
}
