//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// An identifier could not be parsed
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

impl EnvError {
    /// Creates a context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextError(msg.into())
    }

    /// Creates an invalid identifier error.
    pub fn invalid_id(raw: impl std::fmt::Display) -> Self {
        Self::InvalidId(raw.to_string())
    }
}
