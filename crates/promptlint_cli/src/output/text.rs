//! Text output formatter

use std::fmt::Write as _;

use promptlint_core::{DryRun, EvalReport, EvalStats, FailureKind, LintError, LintResult, Severity};

fn location(error: &LintError) -> String {
    match (error.start_line, error.end_line) {
        (Some(start), Some(end)) if end != start => format!("{}-{}", start, end),
        (Some(start), _) => start.to_string(),
        _ => "-".to_string(),
    }
}

fn failure_kind(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::TransientExhausted => "retries exhausted",
        FailureKind::Permanent => "failed",
        FailureKind::Cancelled => "cancelled",
    }
}

pub fn render_lint_result(result: &LintResult, num_files: usize) -> String {
    let mut out = String::new();

    // Errors arrive sorted by path, so each file is one contiguous run.
    let mut current: Option<&str> = None;
    for error in &result.errors {
        if current != Some(error.file_path.as_str()) {
            let _ = writeln!(out, "\n{}:", error.file_path);
            current = Some(&error.file_path);
        }
        let severity = match error.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let _ = writeln!(
            out,
            "  {} {} [{}]: {}",
            location(error),
            severity,
            error.rule_name,
            error.message
        );
        if let Some(code) = &error.code {
            let _ = writeln!(out, "      {}", code.trim());
        }
    }

    if !result.unexpected_errors.is_empty() {
        let _ = writeln!(out, "\nUnexpected errors:");
        for error in &result.unexpected_errors {
            let _ = writeln!(
                out,
                "  {} [{}] {}: {}",
                error.file_path,
                error.rule_name,
                failure_kind(error.kind),
                error.message
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Checked {} files in {} tasks ({} from cache, {} backend calls), found {} issues",
        num_files,
        result.num_tasks,
        result.num_cache_hits,
        result.num_backend_calls,
        result.errors.len()
    );
    if !result.unexpected_errors.is_empty() {
        let _ = writeln!(
            out,
            "{} tasks could not be checked",
            result.unexpected_errors.len()
        );
    }
    out
}

pub fn render_dry_run(plan: &DryRun, num_files: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Dry run over {} files: {} of {} tasks cached, {} backend calls needed",
        num_files,
        plan.cached.num_tasks,
        plan.num_tasks(),
        plan.num_backend_calls
    );
    if !plan.pending.is_empty() {
        let _ = writeln!(out, "\nWould check:");
        for task in &plan.pending {
            let _ = writeln!(out, "  {} [{}]", task.file_path, task.rule_name);
        }
    }
    out
}

pub fn render_stats(result: &LintResult) -> String {
    let rows = [
        ("tasks", result.num_tasks),
        ("cache hits", result.num_cache_hits),
        ("cache misses", result.num_cache_misses),
        ("backend calls", result.num_backend_calls),
        ("retries", result.num_retries),
        ("prompt tokens", result.num_prompt_tokens),
        ("completion tokens", result.num_completion_tokens),
        (
            "total tokens",
            result.num_prompt_tokens + result.num_completion_tokens,
        ),
        ("backend latency ms", result.latency_ms),
    ];

    let mut out = String::from("\nStats:\n");
    for (name, value) in rows {
        let _ = writeln!(out, "  {:<20} {}", format!("{}:", name), value);
    }
    out
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn stats_row(out: &mut String, name: &str, stats: &EvalStats) {
    let _ = writeln!(
        out,
        "{:<30} | {:>5} | {:>4} | {:>4} | {:>4} | {:>4} | {:>4} | {:>9} | {:>7}",
        name,
        stats.num_files,
        stats.num_true_positives,
        stats.num_false_positives,
        stats.num_true_negatives,
        stats.num_false_negatives,
        stats.num_unexpected_errors,
        percent(stats.precision()),
        percent(stats.recall())
    );
}

pub fn render_eval_report(report: &EvalReport) -> String {
    let mut out = String::new();
    let separator = format!(
        "{:-<30}-+-{:-<5}-+-{:-<4}-+-{:-<4}-+-{:-<4}-+-{:-<4}-+-{:-<4}-+-{:-<9}-+-{:-<7}",
        "", "", "", "", "", "", "", "", ""
    );

    let _ = writeln!(
        out,
        "{:<30} | {:>5} | {:>4} | {:>4} | {:>4} | {:>4} | {:>4} | {:>9} | {:>7}",
        "Rule", "Files", "TP", "FP", "TN", "FN", "Err", "Precision", "Recall"
    );
    let _ = writeln!(out, "{}", separator);
    for (name, stats) in &report.per_rule {
        stats_row(&mut out, name, stats);
    }
    let _ = writeln!(out, "{}", separator);
    stats_row(&mut out, "Total", &report.stats);

    let _ = writeln!(
        out,
        "\nAccuracy {}, F1 {}",
        percent(report.stats.accuracy()),
        percent(report.stats.f1())
    );
    out
}
