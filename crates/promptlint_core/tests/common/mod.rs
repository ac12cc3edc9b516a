//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use promptlint_cache::{CacheEntry, CacheError, CacheKey};
use promptlint_core::prompt::SOURCE_FILE_HEADING;
use promptlint_core::{
    Backend, BackendError, CacheManager, CacheStore, Completion, Dispatcher, Linter, LintResult,
    ModelConfig, Prompt, RetryPolicy,
};
use tempfile::TempDir;

type Responder = dyn Fn(&Prompt, usize) -> Result<Completion, BackendError> + Send + Sync;

/// Scriptable backend that records how it was called.
///
/// The responder receives the prompt and the 1-based global call number.
pub struct FakeBackend {
    respond: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new(
        respond: impl Fn(&Prompt, usize) -> Result<Completion, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Reports no violations for anything.
    pub fn clean() -> Self {
        Self::new(|_, _| Ok(Completion::new(clean_json())))
    }

    /// Reports a violation on line 1 whenever the source contains `sk-`.
    pub fn secrets() -> Self {
        Self::new(|prompt, _| {
            let text = if source_section(prompt).contains("sk-") {
                violations_json(&[(1, "Hardcoded API key")])
            } else {
                clean_json()
            };
            Ok(Completion::new(text).with_usage(100, 10))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn complete(
        &self,
        prompt: &Prompt,
        _model: &ModelConfig,
    ) -> Result<Completion, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = (self.respond)(prompt, call);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Cache store whose every operation fails.
pub struct FailingStore;

impl CacheStore for FailingStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::unavailable("store is down"))
    }

    fn set(&self, _key: &CacheKey, _result: &LintResult) -> Result<(), CacheError> {
        Err(CacheError::unavailable("store is down"))
    }

    fn flush(&self) -> Result<(), CacheError> {
        Err(CacheError::unavailable("store is down"))
    }
}

/// The part of the user prompt that holds the file under review.
pub fn source_section(prompt: &Prompt) -> &str {
    prompt
        .user
        .split_once(SOURCE_FILE_HEADING)
        .map_or("", |(_, source)| source)
}

pub fn clean_json() -> String {
    r#"{"violations": []}"#.to_string()
}

pub fn violations_json(violations: &[(u32, &str)]) -> String {
    let violations: Vec<serde_json::Value> = violations
        .iter()
        .map(|(line, message)| {
            serde_json::json!({ "line": line, "message": message, "confidence": "high" })
        })
        .collect();
    serde_json::json!({ "violations": violations }).to_string()
}

/// Retry policy with millisecond backoff for fast tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(5))
}

/// An enabled cache rooted in a fresh temporary directory.
pub fn temp_cache() -> (TempDir, Arc<CacheManager>) {
    let temp_dir = TempDir::new().unwrap();
    let cache = Arc::new(CacheManager::new(temp_dir.path().join("cache")));
    (temp_dir, cache)
}

pub fn dispatcher(backend: &Arc<FakeBackend>, cache: Arc<dyn CacheStore>) -> Dispatcher {
    let backend: Arc<dyn Backend> = Arc::clone(backend) as Arc<dyn Backend>;
    Dispatcher::new(backend, cache, fast_retry())
}

pub fn linter(backend: &Arc<FakeBackend>, cache: Arc<dyn CacheStore>) -> Linter {
    Linter::new(dispatcher(backend, cache), ModelConfig::default())
}
