//! Error types for Chatgate.

use thiserror::Error;

/// Result type alias using the Chatgate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Chatgate services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream inference service error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Upstream(_) => 502,
            _ => 500,
        }
    }
}
