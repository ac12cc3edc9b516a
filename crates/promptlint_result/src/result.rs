//! Lint result type and its merge operator.

use std::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::LintError;

/// Why a task resolved without a usable completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable failures kept happening until the retry budget ran out.
    TransientExhausted,
    /// A failure that retrying cannot fix (auth, malformed request, bug).
    Permanent,
    /// The run was aborted before the task started.
    Cancelled,
}

/// A task that could not be judged by the backend.
///
/// These are never lint violations: a consumer must be able to tell
/// "the backend failed" apart from "the code is clean".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct UnexpectedError {
    pub rule_name: String,
    pub file_path: String,
    pub message: String,
    pub kind: FailureKind,
}

impl UnexpectedError {
    pub fn new(
        rule_name: impl Into<String>,
        file_path: impl Into<String>,
        message: impl Into<String>,
        kind: FailureKind,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            file_path: file_path.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Outcome of one or more (file, rule) lint tasks.
///
/// A single task produces a `LintResult` with `num_tasks == 1`; run-level
/// results are built exclusively through [`LintResult::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct LintResult {
    /// Reported violations. Errors from one task are contiguous.
    pub errors: Vec<LintError>,

    /// Tasks that resolved as an unexpected error.
    #[serde(default)]
    pub unexpected_errors: Vec<UnexpectedError>,

    pub num_tasks: u64,
    pub num_cache_hits: u64,
    pub num_cache_misses: u64,
    pub num_backend_calls: u64,
    pub num_retries: u64,
    pub num_prompt_tokens: u64,
    pub num_completion_tokens: u64,

    /// Wall-clock time spent waiting on the backend, summed over tasks.
    pub latency_ms: u64,
}

impl LintResult {
    /// Creates a result holding the given errors and no bookkeeping.
    pub fn from_errors(errors: Vec<LintError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// Creates a single-task result for a task that failed.
    pub fn unexpected(error: UnexpectedError) -> Self {
        Self {
            unexpected_errors: vec![error],
            num_tasks: 1,
            ..Self::default()
        }
    }

    /// Combines two results. Errors of `self` come before errors of `other`;
    /// every counter is summed.
    #[must_use]
    pub fn merge(mut self, other: LintResult) -> LintResult {
        self.errors.extend(other.errors);
        self.unexpected_errors.extend(other.unexpected_errors);
        self.num_tasks += other.num_tasks;
        self.num_cache_hits += other.num_cache_hits;
        self.num_cache_misses += other.num_cache_misses;
        self.num_backend_calls += other.num_backend_calls;
        self.num_retries += other.num_retries;
        self.num_prompt_tokens += other.num_prompt_tokens;
        self.num_completion_tokens += other.num_completion_tokens;
        self.latency_ms += other.latency_ms;
        self
    }

    /// Folds any number of results, starting from the identity.
    pub fn fold(results: impl IntoIterator<Item = LintResult>) -> LintResult {
        results
            .into_iter()
            .fold(LintResult::default(), LintResult::merge)
    }

    /// Returns the canonical ordering of this result.
    ///
    /// Errors are stably sorted by `(file_path, rule_name)`. A task covers one
    /// (file, rule) pair, so each task's errors stay contiguous and keep their
    /// internal order, while the order in which tasks were folded no longer
    /// shows.
    #[must_use]
    pub fn normalized(mut self) -> LintResult {
        self.errors.sort_by(|a, b| {
            (a.file_path.as_str(), a.rule_name.as_str())
                .cmp(&(b.file_path.as_str(), b.rule_name.as_str()))
        });
        self.unexpected_errors.sort_by(|a, b| {
            (a.file_path.as_str(), a.rule_name.as_str())
                .cmp(&(b.file_path.as_str(), b.rule_name.as_str()))
        });
        self
    }

    /// Returns a copy that records a reuse of this result without a backend
    /// call: same errors, one task, one cache hit, no cost.
    #[must_use]
    pub fn as_cache_hit(&self) -> LintResult {
        LintResult {
            errors: self.errors.clone(),
            unexpected_errors: self.unexpected_errors.clone(),
            num_tasks: 1,
            num_cache_hits: 1,
            ..LintResult::default()
        }
    }

    /// True when no lint violation was reported.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when at least one task failed to produce a judgment.
    pub fn has_unexpected_errors(&self) -> bool {
        !self.unexpected_errors.is_empty()
    }
}

impl Sum for LintResult {
    fn sum<I: Iterator<Item = LintResult>>(iter: I) -> Self {
        LintResult::fold(iter)
    }
}

/// Merges two lint results. See [`LintResult::merge`].
pub fn merge_lint_results(a: LintResult, b: LintResult) -> LintResult {
    a.merge(b)
}
