//! JSON output formatter

use miette::{IntoDiagnostic, Result};
use promptlint_core::{DryRun, EvalReport, EvalStats, LintResult};

pub fn render_lint_result(result: &LintResult, num_files: usize) -> Result<String> {
    let output = serde_json::json!({
        "num_files": num_files,
        "result": result,
    });
    serde_json::to_string_pretty(&output).into_diagnostic()
}

pub fn render_dry_run(plan: &DryRun, num_files: usize) -> Result<String> {
    let output = serde_json::json!({
        "num_files": num_files,
        "num_tasks": plan.num_tasks(),
        "dry_run": plan,
    });
    serde_json::to_string_pretty(&output).into_diagnostic()
}

fn stats_json(stats: &EvalStats) -> serde_json::Value {
    serde_json::json!({
        "counts": stats,
        "precision": stats.precision(),
        "recall": stats.recall(),
        "accuracy": stats.accuracy(),
        "f1": stats.f1(),
    })
}

pub fn render_eval_report(report: &EvalReport) -> Result<String> {
    let rules: serde_json::Map<String, serde_json::Value> = report
        .per_rule
        .iter()
        .map(|(name, stats)| (name.clone(), stats_json(stats)))
        .collect();

    let output = serde_json::json!({
        "rules": rules,
        "total": stats_json(&report.stats),
        "errors": report.lint_result.errors,
        "unexpected_errors": report.lint_result.unexpected_errors,
    });
    serde_json::to_string_pretty(&output).into_diagnostic()
}
