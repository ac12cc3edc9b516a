//! OpenAI-compatible chat-completion backend.
//!
//! Failure classification:
//! - network error, HTTP 429 or 5xx, unreadable body → transient
//! - any other non-success status or a missing API key → permanent

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Backend, BackendError, Completion};
use crate::config::ApiConfig;
use crate::prompt::Prompt;
use crate::{LinterError, ModelConfig};

/// Backend speaking the `/chat/completions` protocol.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    /// Where the key was expected, for error messages.
    api_key_env: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        api_key_env: impl Into<String>,
    ) -> Result<Self, LinterError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("promptlint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LinterError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_key_env: api_key_env.into(),
        })
    }

    /// Reads the API key from the environment variable named in `config`.
    pub fn from_config(config: &ApiConfig) -> Result<Self, LinterError> {
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::new(&config.base_url, api_key, &config.api_key_env)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        prompt: &Prompt,
        model: &ModelConfig,
    ) -> Result<Completion, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::permanent(format!("API key not set ({})", self.api_key_env))
        })?;

        let request = ChatRequest {
            model: &model.model,
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::transient(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, body.trim());
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                BackendError::transient(message)
            } else {
                BackendError::permanent(message)
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::transient(format!("Unreadable response: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::transient("Response has no message content"))?;
        let usage = body.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        debug!(
            "Completion from {}: {} prompt / {} completion tokens",
            model.model, usage.prompt_tokens, usage.completion_tokens
        );
        Ok(Completion::new(text).with_usage(usage.prompt_tokens, usage.completion_tokens))
    }
}
