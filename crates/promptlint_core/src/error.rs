//! Linter error types.

use thiserror::Error;

/// Errors that fail a run as a whole.
///
/// Task-level failures never show up here: they are folded into the
/// [`LintResult`](promptlint_result::LintResult) as unexpected errors.
#[derive(Debug, Error)]
pub enum LinterError {
    /// Configuration error, raised before any task is dispatched.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("File error: {0}")]
    File(String),

    /// Cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] promptlint_cache::CacheError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LinterError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a file error.
    pub fn file(message: impl Into<String>) -> Self {
        Self::File(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
