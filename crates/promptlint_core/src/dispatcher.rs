//! Bounded, cached, failure-isolated execution of lint tasks.
//!
//! # Task lifecycle
//!
//! 1. The task's [`CacheKey`] is looked up. A hit resolves immediately and
//!    never takes a pool slot.
//! 2. Misses sharing a key are computed once; the other tasks receive the
//!    computed result as a cache hit.
//! 3. Unique misses run through [`bounded_map`] with `concurrency` slots.
//! 4. Transient failures are retried under the [`RetryPolicy`]. Permanent or
//!    exhausted failures resolve as a single [`UnexpectedError`].
//! 5. Only successful results are written back to the cache.
//!
//! [`Dispatcher::plan`] runs step 1 alone and reports what a real run would
//! send to the backend, without calling it.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use promptlint_cache::{CacheKey, CacheStore};
use promptlint_result::{FailureKind, LintError, LintResult, UnexpectedError};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendError};
use crate::pool::bounded_map;
use crate::prompt::{Prompt, parse_completion, render_prompt};
use crate::retry::RetryPolicy;
use crate::{LinterError, ModelConfig, Rule, SourceFile};

/// One (file, rule) pair under a model configuration.
#[derive(Debug, Clone)]
pub struct LintTask {
    pub file: Arc<SourceFile>,
    pub rule: Arc<Rule>,
    pub model: Arc<ModelConfig>,
}

impl LintTask {
    pub fn new(file: Arc<SourceFile>, rule: Arc<Rule>, model: Arc<ModelConfig>) -> Self {
        Self { file, rule, model }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            &self.file.fingerprint,
            &self.rule.fingerprint(),
            &self.model.fingerprint(),
        )
    }
}

/// A task a dry run found no cached result for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    pub file_path: String,
    pub rule_name: String,
}

/// What a run would do, computed from the cache alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DryRun {
    /// Merged results of the tasks the cache already answers.
    pub cached: LintResult,
    /// Tasks that would reach the backend, in input order.
    pub pending: Vec<PendingTask>,
    /// Backend calls a real run would start, after deduplication and
    /// before any retry.
    pub num_backend_calls: u64,
}

impl DryRun {
    pub fn num_tasks(&self) -> u64 {
        self.cached.num_tasks + self.pending.len() as u64
    }
}

/// Shared flag that stops a run from starting new backend calls.
///
/// Calls already in flight complete normally.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes lint tasks against a backend through a cache.
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    cache: Arc<dyn CacheStore>,
    retry: RetryPolicy,
    abort: AbortHandle,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<dyn CacheStore>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            cache,
            retry,
            abort: AbortHandle::new(),
        }
    }

    /// Uses an externally owned abort flag, e.g. one tied to Ctrl-C.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Runs every task and returns one result per task, in input order.
    ///
    /// Individual task failures never fail the run; they are reported inside
    /// the corresponding [`LintResult`]. The only error is a zero
    /// `concurrency`.
    pub async fn run(
        &self,
        tasks: Vec<LintTask>,
        concurrency: usize,
    ) -> Result<Vec<LintResult>, LinterError> {
        if concurrency == 0 {
            return Err(LinterError::config("Concurrency must be at least 1"));
        }

        let keys: Vec<CacheKey> = tasks.iter().map(LintTask::cache_key).collect();
        let mut slots: Vec<Option<LintResult>> = vec![None; tasks.len()];
        let mut leaders: HashMap<&str, usize> = HashMap::new();
        let mut pending = Vec::new();
        let mut followers = Vec::new();

        for (index, (task, key)) in tasks.iter().zip(&keys).enumerate() {
            if let Some(cached) = self.lookup(key) {
                debug!(
                    "Cache hit for {} / {}",
                    task.file.path, task.rule.name
                );
                slots[index] = Some(retarget(cached.as_cache_hit(), task));
                continue;
            }
            match leaders.entry(key.as_str()) {
                Entry::Occupied(leader) => followers.push((index, *leader.get())),
                Entry::Vacant(slot) => {
                    slot.insert(index);
                    pending.push((index, task.clone(), key.clone()));
                }
            }
        }

        debug!(
            "Dispatching {} task(s): {} unique miss(es), {} duplicate(s)",
            tasks.len(),
            pending.len(),
            followers.len()
        );

        let computed = bounded_map(pending, concurrency, |(index, task, key)| async move {
            let result = self.execute(&task, &key).await;
            (index, result)
        })
        .await;

        for (index, result) in computed {
            slots[index] = Some(result);
        }
        for (index, leader) in followers {
            slots[index] = slots[leader]
                .as_ref()
                .map(|computed| shared_result(computed, &tasks[index]));
        }

        Ok(slots.into_iter().map(Option::unwrap_or_default).collect())
    }

    /// Resolves every task from the cache and lists the rest, without
    /// calling the backend or writing to the cache.
    pub fn plan(&self, tasks: &[LintTask]) -> DryRun {
        let mut cached = Vec::new();
        let mut pending = Vec::new();
        let mut unique = HashSet::new();

        for task in tasks {
            let key = task.cache_key();
            match self.lookup(&key) {
                Some(hit) => cached.push(retarget(hit.as_cache_hit(), task)),
                None => {
                    unique.insert(key);
                    pending.push(PendingTask {
                        file_path: task.file.path.clone(),
                        rule_name: task.rule.name.clone(),
                    });
                }
            }
        }

        DryRun {
            cached: LintResult::fold(cached),
            pending,
            num_backend_calls: unique.len() as u64,
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<LintResult> {
        match self.cache.get(key) {
            Ok(Some(entry)) if entry.matches(key) => Some(entry.result),
            Ok(_) => None,
            Err(e) => {
                warn!("Cache read failed, recomputing: {}", e);
                None
            }
        }
    }

    async fn execute(&self, task: &LintTask, key: &CacheKey) -> LintResult {
        let started = Instant::now();
        let prompt = render_prompt(&task.file, &task.rule, &task.model);
        let attempts = self.retry.attempts();

        let mut result = LintResult {
            num_tasks: 1,
            num_cache_misses: 1,
            ..LintResult::default()
        };
        let mut attempt = 0;

        let outcome = loop {
            if self.abort.is_aborted() {
                let message = if attempt == 0 {
                    "Run aborted before the task started".to_string()
                } else {
                    format!("Run aborted after {} attempt(s)", attempt)
                };
                break Err((FailureKind::Cancelled, message));
            }

            attempt += 1;
            match self.attempt(&prompt, task, &mut result).await {
                Ok(errors) => break Ok(errors),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} for {} / {} failed, retrying in {:?}: {}",
                        attempt,
                        attempts,
                        task.file.path,
                        task.rule.name,
                        delay,
                        e.message()
                    );
                    result.num_retries += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    break Err((
                        FailureKind::TransientExhausted,
                        format!("{} (gave up after {} attempt(s))", e.message(), attempt),
                    ));
                }
                Err(e) => break Err((FailureKind::Permanent, e.message().to_string())),
            }
        };

        result.latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(errors) => {
                debug!(
                    "{} / {}: {} violation(s)",
                    task.file.path,
                    task.rule.name,
                    errors.len()
                );
                result.errors = errors;
                if let Err(e) = self.cache.set(key, &result) {
                    warn!("Cache write failed: {}", e);
                }
            }
            Err((kind, message)) => {
                warn!(
                    "Unexpected error for {} / {}: {}",
                    task.file.path, task.rule.name, message
                );
                result.unexpected_errors.push(UnexpectedError::new(
                    &task.rule.name,
                    &task.file.path,
                    message,
                    kind,
                ));
            }
        }
        result
    }

    /// One backend call bounded by the policy timeout.
    async fn attempt(
        &self,
        prompt: &Prompt,
        task: &LintTask,
        result: &mut LintResult,
    ) -> Result<Vec<LintError>, BackendError> {
        result.num_backend_calls += 1;
        let completion = tokio::time::timeout(
            self.retry.timeout,
            self.backend.complete(prompt, &task.model),
        )
        .await
        .map_err(|_| {
            BackendError::transient(format!(
                "Backend call timed out after {:?}",
                self.retry.timeout
            ))
        })??;

        result.num_prompt_tokens += completion.prompt_tokens;
        result.num_completion_tokens += completion.completion_tokens;
        parse_completion(&completion.text, &task.file, &task.rule)
    }
}

/// Result handed to a task whose key was computed by another task in the
/// same run.
fn shared_result(computed: &LintResult, task: &LintTask) -> LintResult {
    if computed.has_unexpected_errors() {
        let shared = LintResult {
            unexpected_errors: computed.unexpected_errors.clone(),
            num_tasks: 1,
            ..LintResult::default()
        };
        return retarget(shared, task);
    }
    retarget(computed.as_cache_hit(), task)
}

/// Points a reused result at the task it now answers for. Equal keys imply
/// equal content, but not an equal path.
fn retarget(mut result: LintResult, task: &LintTask) -> LintResult {
    for error in &mut result.errors {
        error.file_path.clone_from(&task.file.path);
        error.rule_name.clone_from(&task.rule.name);
    }
    for error in &mut result.unexpected_errors {
        error.file_path.clone_from(&task.file.path);
        error.rule_name.clone_from(&task.rule.name);
    }
    result
}
