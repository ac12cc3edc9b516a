//! Integration tests for task dispatch: concurrency, caching, retries and
//! failure isolation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    FailingStore, FakeBackend, clean_json, dispatcher, source_section, temp_cache,
    violations_json,
};
use pretty_assertions::assert_eq;
use promptlint_core::{
    BackendError, CacheManager, Completion, FailureKind, LintTask, LinterError, ModelConfig,
    RetryPolicy, Rule, SourceFile,
};
use rstest::rstest;

fn task(path: &str, content: &str, rule: &Arc<Rule>) -> LintTask {
    LintTask::new(
        Arc::new(SourceFile::new(path, content)),
        Arc::clone(rule),
        Arc::new(ModelConfig::default()),
    )
}

fn secrets_rule() -> Arc<Rule> {
    Arc::new(Rule::new(
        "no-hardcoded-secrets",
        "Do not hardcode API keys or other secrets.",
    ))
}

fn distinct_tasks(count: usize) -> Vec<LintTask> {
    let rule = secrets_rule();
    (0..count)
        .map(|i| task(&format!("f{i}.ts"), &format!("const v{i} = {i}"), &rule))
        .collect()
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(8)]
#[tokio::test]
async fn test_in_flight_calls_never_exceed_concurrency(#[case] concurrency: usize) {
    let backend = Arc::new(FakeBackend::clean().with_delay(Duration::from_millis(10)));
    let (_dir, cache) = temp_cache();

    let results = dispatcher(&backend, cache)
        .run(distinct_tasks(20), concurrency)
        .await
        .unwrap();

    assert_eq!(results.len(), 20);
    assert_eq!(backend.calls(), 20);
    assert!(
        backend.max_in_flight() <= concurrency,
        "{} calls in flight with concurrency {}",
        backend.max_in_flight(),
        concurrency
    );
    assert!(backend.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_results_keep_input_order() {
    let backend = Arc::new(FakeBackend::new(|prompt, _| {
        let text = if source_section(prompt).contains("sk-") {
            violations_json(&[(1, "secret")])
        } else {
            clean_json()
        };
        Ok(Completion::new(text))
    }));
    let (_dir, cache) = temp_cache();
    let rule = secrets_rule();
    let tasks = vec![
        task("a.ts", "const a = 'sk-1'", &rule),
        task("b.ts", "const b = 1", &rule),
        task("c.ts", "const c = 'sk-3'", &rule),
    ];

    let results = dispatcher(&backend, cache).run(tasks, 3).await.unwrap();

    let paths: Vec<Vec<&str>> = results
        .iter()
        .map(|r| r.errors.iter().map(|e| e.file_path.as_str()).collect())
        .collect();
    assert_eq!(paths, vec![vec!["a.ts"], vec![], vec!["c.ts"]]);
}

#[tokio::test]
async fn test_permanent_failure_is_isolated() {
    let backend = Arc::new(FakeBackend::new(|prompt, _| {
        if source_section(prompt).contains("poison") {
            Err(BackendError::permanent("invalid request"))
        } else {
            Ok(Completion::new(clean_json()))
        }
    }));
    let (_dir, cache) = temp_cache();
    let rule = secrets_rule();
    let tasks = vec![
        task("a.ts", "fine", &rule),
        task("b.ts", "poison", &rule),
        task("c.ts", "also fine", &rule),
    ];

    let results = dispatcher(&backend, cache).run(tasks, 2).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].unexpected_errors.is_empty());
    assert!(results[2].unexpected_errors.is_empty());

    let failed = &results[1];
    assert!(failed.errors.is_empty());
    assert_eq!(failed.num_tasks, 1);
    assert_eq!(failed.unexpected_errors.len(), 1);
    assert_eq!(failed.unexpected_errors[0].kind, FailureKind::Permanent);
    assert_eq!(failed.unexpected_errors[0].file_path, "b.ts");
    assert_eq!(failed.unexpected_errors[0].rule_name, "no-hardcoded-secrets");
    assert_eq!(backend.calls(), 3, "permanent failures are not retried");
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let backend = Arc::new(FakeBackend::new(|_, call| {
        if call < 3 {
            Err(BackendError::transient("429 Too Many Requests"))
        } else {
            Ok(Completion::new(violations_json(&[(2, "secret")])))
        }
    }));
    let (_dir, cache) = temp_cache();

    let results = dispatcher(&backend, cache)
        .run(distinct_tasks(1), 1)
        .await
        .unwrap();

    let result = &results[0];
    assert_eq!(backend.calls(), 3);
    assert_eq!(result.errors.len(), 1);
    assert!(result.unexpected_errors.is_empty());
    assert_eq!(result.num_backend_calls, 3);
    assert_eq!(result.num_retries, 2);
    assert_eq!(result.num_cache_misses, 1);
}

#[tokio::test]
async fn test_transient_failures_exhaust_retry_budget() {
    let backend = Arc::new(FakeBackend::new(|_, _| {
        Err(BackendError::transient("503 Service Unavailable"))
    }));
    let (_dir, cache) = temp_cache();

    let results = dispatcher(&backend, cache)
        .run(distinct_tasks(1), 1)
        .await
        .unwrap();

    let result = &results[0];
    assert_eq!(backend.calls(), 3);
    assert!(result.errors.is_empty(), "a failure is never 'no violations'");
    assert_eq!(result.unexpected_errors.len(), 1);
    assert_eq!(
        result.unexpected_errors[0].kind,
        FailureKind::TransientExhausted
    );
    assert!(result.unexpected_errors[0].message.contains("503"));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let backend = Arc::new(FakeBackend::clean().with_delay(Duration::from_millis(500)));
    let (_dir, cache) = temp_cache();
    let policy = RetryPolicy::default()
        .with_max_attempts(2)
        .with_base_delay(Duration::from_millis(1))
        .with_timeout(Duration::from_millis(20));
    let dispatcher = promptlint_core::Dispatcher::new(
        Arc::clone(&backend) as Arc<dyn promptlint_core::Backend>,
        cache,
        policy,
    );

    let results = dispatcher.run(distinct_tasks(1), 1).await.unwrap();

    let unexpected = &results[0].unexpected_errors;
    assert_eq!(unexpected.len(), 1);
    assert_eq!(unexpected[0].kind, FailureKind::TransientExhausted);
    assert!(unexpected[0].message.contains("timed out"));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_malformed_completion_becomes_unexpected_error() {
    let backend = Arc::new(FakeBackend::new(|_, _| {
        Ok(Completion::new("I could not find any problems."))
    }));
    let (_dir, cache) = temp_cache();

    let results = dispatcher(&backend, cache.clone())
        .run(distinct_tasks(1), 1)
        .await
        .unwrap();

    assert!(results[0].errors.is_empty());
    assert_eq!(
        results[0].unexpected_errors[0].kind,
        FailureKind::TransientExhausted
    );
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_identical_keys_are_computed_once() {
    let backend = Arc::new(
        FakeBackend::new(|_, _| Ok(Completion::new(violations_json(&[(1, "secret")]))))
            .with_delay(Duration::from_millis(10)),
    );
    let (_dir, cache) = temp_cache();
    let rule = secrets_rule();
    let tasks = vec![
        task("a.ts", "const k = 'sk-1'", &rule),
        task("copy/a.ts", "const k = 'sk-1'", &rule),
        task("b.ts", "const k = 'sk-2'", &rule),
        task("copy/b.ts", "const k = 'sk-2'", &rule),
    ];

    let results = dispatcher(&backend, cache).run(tasks, 4).await.unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(results[0].num_cache_misses, 1);
    assert_eq!(results[1].num_cache_hits, 1);
    assert_eq!(results[1].num_backend_calls, 0);
    assert_eq!(results[1].errors[0].file_path, "copy/a.ts");
    assert_eq!(results[3].errors[0].file_path, "copy/b.ts");
}

#[tokio::test]
async fn test_cache_hit_for_renamed_file_reports_new_path() {
    let backend = Arc::new(FakeBackend::new(|_, _| {
        Ok(Completion::new(violations_json(&[(1, "secret")])))
    }));
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache);
    let rule = secrets_rule();

    dispatcher
        .run(vec![task("old.ts", "const k = 'sk-1'", &rule)], 1)
        .await
        .unwrap();
    let results = dispatcher
        .run(vec![task("new.ts", "const k = 'sk-1'", &rule)], 1)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(results[0].num_cache_hits, 1);
    assert_eq!(results[0].errors[0].file_path, "new.ts");
}

#[tokio::test]
async fn test_changed_inputs_miss_the_cache() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache);
    let file = Arc::new(SourceFile::new("a.ts", "const a = 1"));
    let rule = secrets_rule();

    let base = LintTask::new(
        Arc::clone(&file),
        Arc::clone(&rule),
        Arc::new(ModelConfig::default()),
    );
    let other_model = LintTask::new(
        Arc::clone(&file),
        Arc::clone(&rule),
        Arc::new(ModelConfig::new("gpt-4o")),
    );
    let other_rule = LintTask::new(
        Arc::clone(&file),
        Arc::new(Rule::new("no-hardcoded-secrets", "Something else.")),
        Arc::new(ModelConfig::default()),
    );

    dispatcher.run(vec![base.clone()], 1).await.unwrap();
    dispatcher.run(vec![base, other_model, other_rule], 1).await.unwrap();

    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let backend = Arc::new(FakeBackend::new(|_, _| {
        Err(BackendError::permanent("401 Unauthorized"))
    }));
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache.clone());

    dispatcher.run(distinct_tasks(2), 2).await.unwrap();
    dispatcher.run(distinct_tasks(2), 2).await.unwrap();

    assert_eq!(backend.calls(), 4);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_aborted_run_starts_no_calls() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache);
    dispatcher.abort_handle().abort();

    let results = dispatcher.run(distinct_tasks(3), 2).await.unwrap();

    assert_eq!(backend.calls(), 0);
    for result in &results {
        assert_eq!(result.num_tasks, 1);
        assert_eq!(result.unexpected_errors.len(), 1);
        assert_eq!(result.unexpected_errors[0].kind, FailureKind::Cancelled);
    }
}

#[tokio::test]
async fn test_aborted_run_still_serves_cache_hits() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache);

    dispatcher.run(distinct_tasks(1), 1).await.unwrap();
    dispatcher.abort_handle().abort();
    let results = dispatcher.run(distinct_tasks(2), 1).await.unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(results[0].num_cache_hits, 1);
    assert!(results[0].unexpected_errors.is_empty());
    assert_eq!(results[1].unexpected_errors[0].kind, FailureKind::Cancelled);
}

#[tokio::test]
async fn test_cache_failures_degrade_to_recomputation() {
    let backend = Arc::new(FakeBackend::clean());
    let dispatcher = dispatcher(&backend, Arc::new(FailingStore));

    let first = dispatcher.run(distinct_tasks(2), 2).await.unwrap();
    let second = dispatcher.run(distinct_tasks(2), 2).await.unwrap();

    assert_eq!(backend.calls(), 4);
    assert!(first.iter().chain(&second).all(|r| r.unexpected_errors.is_empty()));
}

#[tokio::test]
async fn test_disabled_cache_always_misses() {
    let backend = Arc::new(FakeBackend::clean());
    let mut cache = CacheManager::new("unused");
    cache.disable();
    let dispatcher = dispatcher(&backend, Arc::new(cache));

    dispatcher.run(distinct_tasks(2), 2).await.unwrap();
    dispatcher.run(distinct_tasks(2), 2).await.unwrap();

    assert_eq!(backend.calls(), 4);
}

#[tokio::test]
async fn test_zero_concurrency_is_a_config_error() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();

    let err = dispatcher(&backend, cache)
        .run(distinct_tasks(1), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, LinterError::Config(_)));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_empty_task_list() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();

    let results = dispatcher(&backend, cache).run(Vec::new(), 4).await.unwrap();

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_plan_serves_hits_and_lists_misses_without_calling_backend() {
    let backend = Arc::new(FakeBackend::secrets());
    let (_dir, cache) = temp_cache();
    let dispatcher = dispatcher(&backend, cache.clone());
    let rule = secrets_rule();

    dispatcher
        .run(vec![task("a.ts", "const k = \"sk-1\"", &rule)], 1)
        .await
        .unwrap();
    assert_eq!(backend.calls(), 1);

    let tasks = vec![
        task("a.ts", "const k = \"sk-1\"", &rule),
        task("b.ts", "const b = 2", &rule),
        task("copy-of-b.ts", "const b = 2", &rule),
    ];
    let plan = dispatcher.plan(&tasks);

    assert_eq!(backend.calls(), 1);
    assert_eq!(plan.cached.num_cache_hits, 1);
    assert_eq!(plan.cached.errors.len(), 1);
    assert_eq!(plan.cached.errors[0].file_path, "a.ts");
    let pending: Vec<&str> = plan.pending.iter().map(|t| t.file_path.as_str()).collect();
    assert_eq!(pending, vec!["b.ts", "copy-of-b.ts"]);
    assert_eq!(plan.num_backend_calls, 1);
    assert_eq!(plan.num_tasks(), 3);
}

#[tokio::test]
async fn test_plan_writes_nothing_to_cache() {
    let backend = Arc::new(FakeBackend::clean());
    let (_dir, cache) = temp_cache();

    let plan = dispatcher(&backend, cache.clone()).plan(&distinct_tasks(3));

    assert_eq!(plan.pending.len(), 3);
    assert_eq!(plan.num_backend_calls, 3);
    assert!(cache.is_empty());
    assert_eq!(backend.calls(), 0);
}
