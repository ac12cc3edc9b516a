//! Linter configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jsonc_parser::ParseOptions;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::{LinterError, ModelConfig, Rule};

/// Configuration for the linter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinterConfig {
    /// Inline rule definitions.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// File patterns to include.
    #[serde(default)]
    pub include: Vec<String>,

    /// File patterns to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Whether to enable caching.
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Cache directory, relative to `base_dir` unless absolute.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Days a cached result is kept before it is pruned. `0` keeps results
    /// forever.
    #[serde(default = "default_cache_max_age_days")]
    pub cache_max_age_days: u64,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Base directory for resolving relative paths.
    /// This is usually the directory containing the configuration file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_cache() -> bool {
    true
}

fn default_cache_dir() -> String {
    ".promptlint-cache".to_string()
}

fn default_cache_max_age_days() -> u64 {
    30
}

/// Concurrency bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Backend calls in flight at once.
    #[serde(default = "default_files_concurrency")]
    pub files: usize,

    /// Rules evaluated at once by `eval`.
    #[serde(default = "default_rules_concurrency")]
    pub rules: usize,
}

fn default_files_concurrency() -> usize {
    8
}

fn default_rules_concurrency() -> usize {
    4
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            files: default_files_concurrency(),
            rules: default_rules_concurrency(),
        }
    }
}

/// Retry settings, see [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-call timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Chat-completion API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key. The key itself never lives
    /// in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LinterConfig {
    /// File names searched by [`LinterConfig::discover`], in priority order.
    pub const CONFIG_FILES: &'static [&'static str] =
        &[".promptlint.jsonc", ".promptlint.json", "promptlint.json"];

    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            cache: true,
            cache_dir: default_cache_dir(),
            cache_max_age_days: default_cache_max_age_days(),
            model: ModelConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            api: ApiConfig::default(),
            base_dir: None,
        }
    }

    /// Loads configuration from a file.
    ///
    /// Supports JSON with comments and trailing commas.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LinterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LinterError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&content)?;

        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses and validates configuration from a JSONC string.
    pub fn from_json(json: &str) -> Result<Self, LinterError> {
        let value = jsonc_parser::parse_to_serde_value(json, &ParseOptions::default())
            .map_err(|e| LinterError::config(format!("Invalid JSON: {}", e)))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        let config: Self = serde_json::from_value(value)
            .map_err(|e| LinterError::config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Finds the nearest config file in `start` or any of its ancestors.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            Self::CONFIG_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), LinterError> {
        if self.concurrency.files == 0 {
            return Err(LinterError::config("concurrency.files must be at least 1"));
        }
        if self.concurrency.rules == 0 {
            return Err(LinterError::config("concurrency.rules must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(LinterError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.timeout_secs == 0 {
            return Err(LinterError::config("retry.timeout_secs must be at least 1"));
        }
        if self.model.model.trim().is_empty() {
            return Err(LinterError::config("model.model must not be empty"));
        }
        Ok(())
    }

    /// Cache directory resolved against `base_dir`.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        let dir = Path::new(&self.cache_dir);
        match &self.base_dir {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.to_path_buf(),
        }
    }

    /// Maximum age of a cached result, or `None` when results never expire.
    pub fn cache_max_age(&self) -> Option<Duration> {
        (self.cache_max_age_days > 0)
            .then(|| Duration::from_secs(self.cache_max_age_days.saturating_mul(86_400)))
    }
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self::new()
    }
}
