//! Core linter engine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use promptlint_cache::{CacheManager, CacheStore};
use promptlint_result::LintResult;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::dispatcher::{AbortHandle, Dispatcher, DryRun, LintTask};
use crate::rule::validate_rules;
use crate::{LinterConfig, LinterError, ModelConfig, Rule, RuleScope, SourceFile};

/// The core linter engine.
///
/// Builds the (file, rule) task set, drives the [`Dispatcher`], and folds
/// the per-task outcomes into one [`LintResult`].
pub struct Linter {
    dispatcher: Dispatcher,
    model: Arc<ModelConfig>,
    /// Backend calls in flight at once.
    concurrency: usize,
}

impl Linter {
    /// Default number of concurrent backend calls.
    pub const DEFAULT_CONCURRENCY: usize = 8;

    pub fn new(dispatcher: Dispatcher, model: ModelConfig) -> Self {
        Self {
            dispatcher,
            model: Arc::new(model),
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Wires a linter from configuration: persistent cache (unless
    /// disabled), retry policy, and concurrency.
    pub fn from_config(config: &LinterConfig, backend: Arc<dyn Backend>) -> Self {
        let mut cache = CacheManager::new(config.resolved_cache_dir());
        if let Some(max_age) = config.cache_max_age() {
            cache = cache.with_max_age(max_age);
        }
        if config.cache {
            if let Err(e) = cache.load() {
                warn!("Failed to load cache: {}", e);
            }
        } else {
            cache.disable();
        }

        let cache: Arc<dyn CacheStore> = Arc::new(cache);
        let dispatcher = Dispatcher::new(backend, cache, config.retry.policy());

        Self::new(dispatcher, config.model.clone()).with_concurrency(config.concurrency.files)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn model(&self) -> &Arc<ModelConfig> {
        &self.model
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        self.dispatcher.abort_handle()
    }

    /// Builds the task list: every `file` rule against every file, and every
    /// `project` rule once against the concatenated project.
    pub fn build_tasks(&self, files: &[SourceFile], rules: &[Rule]) -> Vec<LintTask> {
        let shared_files: Vec<Arc<SourceFile>> = files.iter().cloned().map(Arc::new).collect();
        let project = rules
            .iter()
            .any(|rule| rule.scope == RuleScope::Project)
            .then(|| Arc::new(SourceFile::project(files)));

        let mut tasks = Vec::new();
        for rule in rules {
            let rule = Arc::new(rule.clone());
            match (rule.scope, &project) {
                (RuleScope::File, _) => {
                    tasks.extend(shared_files.iter().map(|file| {
                        LintTask::new(Arc::clone(file), Arc::clone(&rule), Arc::clone(&self.model))
                    }));
                }
                (RuleScope::Project, Some(project)) if !files.is_empty() => {
                    tasks.push(LintTask::new(
                        Arc::clone(project),
                        Arc::clone(&rule),
                        Arc::clone(&self.model),
                    ));
                }
                (RuleScope::Project, _) => {}
            }
        }
        tasks
    }

    /// Lints `files` against `rules`.
    ///
    /// Fails only on invalid input. Backend failures are reported as
    /// unexpected errors inside the result.
    pub async fn lint(
        &self,
        files: &[SourceFile],
        rules: &[Rule],
    ) -> Result<LintResult, LinterError> {
        validate_inputs(files, rules)?;
        let started = Instant::now();

        let active = active_rules(rules);
        let tasks = self.build_tasks(files, &active);
        let results = self.dispatcher.run(tasks, self.concurrency).await?;
        let result = LintResult::fold(results).normalized();

        self.flush_cache().await;

        info!(
            "Linted {} file(s) with {} rule(s) in {:?}: {} task(s), {} cache hit(s), {} backend call(s), {} violation(s), {} unexpected error(s)",
            files.len(),
            active.len(),
            started.elapsed(),
            result.num_tasks,
            result.num_cache_hits,
            result.num_backend_calls,
            result.errors.len(),
            result.unexpected_errors.len()
        );
        Ok(result)
    }

    /// Reports which tasks the cache already answers and which would reach
    /// the backend. Nothing is sent and nothing is written.
    pub fn dry_run(&self, files: &[SourceFile], rules: &[Rule]) -> Result<DryRun, LinterError> {
        validate_inputs(files, rules)?;

        let tasks = self.build_tasks(files, &active_rules(rules));
        let mut plan = self.dispatcher.plan(&tasks);
        plan.cached = plan.cached.normalized();

        info!(
            "Dry run over {} file(s): {} of {} task(s) cached, {} backend call(s) needed",
            files.len(),
            plan.cached.num_tasks,
            plan.num_tasks(),
            plan.num_backend_calls
        );
        Ok(plan)
    }

    /// Lints a single (file, rule) pair. Does not flush the cache.
    ///
    /// Backend failures come back as an unexpected error inside the result,
    /// exactly as in [`Linter::lint`].
    pub async fn lint_one(
        &self,
        file: &SourceFile,
        rule: &Rule,
    ) -> Result<LintResult, LinterError> {
        let task = LintTask::new(
            Arc::new(file.clone()),
            Arc::new(rule.clone()),
            Arc::clone(&self.model),
        );
        self.dispatcher
            .run(vec![task], 1)
            .await?
            .pop()
            .ok_or_else(|| {
                LinterError::internal(format!(
                    "No result for {} with rule '{}'",
                    file.path, rule.name
                ))
            })
    }

    /// Persists pending cache writes. Failures are logged, never returned.
    pub async fn flush_cache(&self) {
        let cache = Arc::clone(self.dispatcher.cache());
        match tokio::task::spawn_blocking(move || cache.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to save cache: {}", e),
            Err(e) => warn!("Cache flush task failed: {}", e),
        }
    }
}

/// Rules that can be sent to the backend. Rules without a description are
/// skipped with a warning.
fn active_rules(rules: &[Rule]) -> Vec<Rule> {
    rules
        .iter()
        .filter(|rule| {
            if rule.has_description() {
                true
            } else {
                warn!("Skipping rule '{}': it has no description", rule.name);
                false
            }
        })
        .cloned()
        .collect()
}

/// Rejects inputs that cannot produce a meaningful run.
pub fn validate_inputs(files: &[SourceFile], rules: &[Rule]) -> Result<(), LinterError> {
    validate_rules(rules)?;

    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.path.as_str()) {
            return Err(LinterError::config(format!(
                "Duplicate file path '{}'",
                file.path
            )));
        }
    }
    Ok(())
}
