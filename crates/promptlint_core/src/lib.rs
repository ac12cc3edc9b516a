//! # promptlint_core
//!
//! Core lint orchestration engine for promptlint.
//!
//! This crate provides:
//! - The `Linter` orchestrator and the `Evaluator` built on top of it
//! - The `Dispatcher`: cached, bounded, retrying execution of lint tasks
//! - The `Backend` seam and an OpenAI-compatible implementation
//! - Configuration loading and file discovery
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use promptlint_core::{Linter, LinterConfig, OpenAiBackend, file_finder};
//!
//! let config = LinterConfig::from_file(".promptlint.json")?;
//! let backend = Arc::new(OpenAiBackend::from_config(&config.api)?);
//! let linter = Linter::from_config(&config, backend);
//!
//! let result = linter.lint(&files, &config.rules).await?;
//! for error in &result.errors {
//!     println!("{}: {} ({})", error.file_path, error.message, error.rule_name);
//! }
//! ```

pub mod backend;
mod config;
pub mod dispatcher;
mod error;
pub mod eval;
pub mod file_finder;
mod linter;
mod model;
mod openai;
pub mod pool;
pub mod prompt;
pub mod retry;
mod rule;
mod source;

pub use backend::{Backend, BackendError, Completion};
pub use config::{ApiConfig, ConcurrencyConfig, LinterConfig, RetryConfig};
pub use dispatcher::{AbortHandle, Dispatcher, DryRun, LintTask, PendingTask};
pub use error::LinterError;
pub use eval::{EvalMode, EvalReport, EvalSet, Evaluator, Label};
pub use linter::{Linter, validate_inputs};
pub use model::ModelConfig;
pub use openai::OpenAiBackend;
pub use prompt::Prompt;
pub use retry::RetryPolicy;
pub use rule::{Rule, RuleExample, RuleScope, is_valid_rule_name, validate_rules};
pub use source::{PROJECT_PATH, SourceFile};

pub use promptlint_cache::{CacheManager, CacheStore};
pub use promptlint_result::{
    Confidence, EvalStats, FailureKind, LintError, LintResult, Severity, UnexpectedError,
    merge_eval_stats, merge_lint_results,
};
