//! The completion backend seam.
//!
//! The dispatcher treats the backend as a black box from a rendered
//! [`Prompt`] to completion text. Every failure it reports must already be
//! classified: [`BackendError::Transient`] is retried with backoff,
//! [`BackendError::Permanent`] is not.

use async_trait::async_trait;
use thiserror::Error;

use crate::ModelConfig;
use crate::prompt::Prompt;

/// Text returned by the backend plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }
}

/// A classified backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network trouble, timeouts, rate limits, malformed-but-retryable output.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Auth failures, rejected requests, anything retrying cannot fix.
    #[error("Permanent backend error: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Permanent(message) => message,
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Completes a rendered prompt under the given model parameters.
    async fn complete(
        &self,
        prompt: &Prompt,
        model: &ModelConfig,
    ) -> Result<Completion, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_classification() {
        let transient = BackendError::transient("rate limited");
        let permanent = BackendError::permanent("bad key");

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert_eq!(transient.message(), "rate limited");
        assert_eq!(permanent.to_string(), "Permanent backend error: bad key");
    }

    #[test]
    fn test_completion_with_usage() {
        let completion = Completion::new("{}").with_usage(10, 2);

        assert_eq!(completion.text, "{}");
        assert_eq!(completion.prompt_tokens, 10);
        assert_eq!(completion.completion_tokens, 2);
    }
}
