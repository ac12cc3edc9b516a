//! Output formatting module

mod json;
mod text;

use miette::Result;
use promptlint_core::{DryRun, EvalReport, LintResult};

use crate::cli::OutputFormat;

pub fn output_lint_result(result: &LintResult, num_files: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", json::render_lint_result(result, num_files)?),
        OutputFormat::Text => print!("{}", text::render_lint_result(result, num_files)),
    }
    Ok(())
}

pub fn output_eval_report(report: &EvalReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", json::render_eval_report(report)?),
        OutputFormat::Text => print!("{}", text::render_eval_report(report)),
    }
    Ok(())
}

pub fn output_dry_run(plan: &DryRun, num_files: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", json::render_dry_run(plan, num_files)?),
        OutputFormat::Text => print!("{}", text::render_dry_run(plan, num_files)),
    }
    Ok(())
}

/// Writes run counters to stderr, keeping stdout for the report itself.
pub fn print_debug_stats(result: &LintResult) {
    eprint!("{}", text::render_stats(result));
}
