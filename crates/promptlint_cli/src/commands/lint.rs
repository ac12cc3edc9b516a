//! Lint command implementation

use miette::{IntoDiagnostic, Result};
use promptlint_core::file_finder::{FileFinder, read_source_files};

use super::{Outcome, build_linter, load_config};
use crate::cli::{Cli, OutputFormat};
use crate::output::{output_dry_run, output_lint_result, print_debug_stats};
use crate::utils::{abort_on_ctrl_c, create_tokio_runtime};

pub fn run_lint(
    cli: &Cli,
    patterns: &[String],
    format: OutputFormat,
    concurrency: Option<usize>,
    dry_run: bool,
) -> Result<Outcome> {
    let mut config = load_config(cli)?;
    if let Some(concurrency) = concurrency {
        config.concurrency.files = concurrency;
        config.validate().into_diagnostic()?;
    }

    let base_dir = std::env::current_dir().into_diagnostic()?;
    let finder = FileFinder::new(&config.include, &config.exclude).into_diagnostic()?;
    let paths = finder.discover_files(patterns, &base_dir).into_diagnostic()?;
    let files = read_source_files(&paths, &base_dir).into_diagnostic()?;

    if dry_run {
        let linter = build_linter(&config)?;
        let plan = linter.dry_run(&files, &config.rules).into_diagnostic()?;
        if cli.debug_stats {
            print_debug_stats(&plan.cached);
        }
        output_dry_run(&plan, files.len(), format)?;
        return Ok(Outcome::Clean);
    }

    let runtime = create_tokio_runtime()?;
    let result = runtime.block_on(async {
        let linter = build_linter(&config)?;
        abort_on_ctrl_c(linter.abort_handle().clone());
        linter.lint(&files, &config.rules).await.into_diagnostic()
    })?;

    if cli.debug_stats {
        print_debug_stats(&result);
    }
    output_lint_result(&result, files.len(), format)?;
    Ok(Outcome::from_lint(&result))
}
