//! Subcommand implementations

pub mod eval;
pub mod lint;

use std::process::ExitCode;
use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use promptlint_core::{Backend, EvalReport, LintResult, Linter, LinterConfig, OpenAiBackend};
use tracing::{debug, warn};

use crate::cli::Cli;

/// How a run ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    Clean,
    /// Lint violations, or misjudged eval fixtures.
    Violations,
    /// Some task could not be judged by the backend.
    Unexpected,
}

impl Outcome {
    pub fn from_lint(result: &LintResult) -> Self {
        if result.has_unexpected_errors() {
            Self::Unexpected
        } else if !result.is_clean() {
            Self::Violations
        } else {
            Self::Clean
        }
    }

    pub fn from_eval(report: &EvalReport) -> Self {
        if report.has_unexpected_errors() {
            Self::Unexpected
        } else if report.has_misclassifications() {
            Self::Violations
        } else {
            Self::Clean
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::Violations => ExitCode::from(1),
            Self::Unexpected => ExitCode::from(2),
        }
    }
}

/// Loads the config named on the command line, or the nearest one found
/// from the working directory upward.
pub fn load_config(cli: &Cli) -> Result<LinterConfig> {
    let mut config = if let Some(ref path) = cli.config {
        LinterConfig::from_file(path).into_diagnostic()?
    } else {
        let cwd = std::env::current_dir().into_diagnostic()?;
        let path = LinterConfig::discover(&cwd).ok_or_else(|| {
            miette::miette!(
                "No configuration file found (looked for {})",
                LinterConfig::CONFIG_FILES.join(", ")
            )
        })?;
        debug!("Using config {}", path.display());
        LinterConfig::from_file(&path).into_diagnostic()?
    };

    if cli.no_cache {
        config.cache = false;
    }
    Ok(config)
}

/// Builds a linter on the configured HTTP backend.
pub fn build_linter(config: &LinterConfig) -> Result<Linter> {
    let backend = OpenAiBackend::from_config(&config.api).into_diagnostic()?;
    if !backend.has_api_key() {
        warn!(
            "{} is not set; every backend call will fail",
            config.api.api_key_env
        );
    }
    let backend: Arc<dyn Backend> = Arc::new(backend);
    Ok(Linter::from_config(config, backend))
}
