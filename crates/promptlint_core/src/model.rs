//! Backend invocation parameters.

use promptlint_cache::hash_content;
use serde::{Deserialize, Serialize};

use crate::prompt::PROMPT_TEMPLATE_VERSION;

/// Parameters of every backend call in a run.
///
/// The fingerprint is part of each cache key, so changing any field
/// invalidates exactly the entries computed under the old values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier understood by the backend.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Version of the prompt template used to render tasks.
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_prompt_version() -> String {
    PROMPT_TEMPLATE_VERSION.to_string()
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Computes a hash of the configuration for cache keys.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        hash_content(&json)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            prompt_version: default_prompt_version(),
        }
    }
}
