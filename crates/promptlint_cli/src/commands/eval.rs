//! Eval command implementation

use std::collections::HashMap;
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use promptlint_core::file_finder::resolve_eval_set;
use promptlint_core::{EvalMode, EvalSet, Evaluator, Rule};

use super::{Outcome, build_linter, load_config};
use crate::cli::{Cli, OutputFormat};
use crate::output::{output_eval_report, print_debug_stats};
use crate::utils::{abort_on_ctrl_c, create_tokio_runtime};

pub fn run_eval(
    cli: &Cli,
    evals_dir: &Path,
    only_correct: bool,
    only_incorrect: bool,
    rule_names: &[String],
    format: OutputFormat,
) -> Result<Outcome> {
    let mode = EvalMode::from_flags(only_correct, only_incorrect).into_diagnostic()?;
    let config = load_config(cli)?;
    let rules = select_rules(&config.rules, rule_names)?;

    let mut eval_sets: HashMap<String, EvalSet> = HashMap::new();
    for rule in &rules {
        let set = resolve_eval_set(evals_dir, &rule.name).into_diagnostic()?;
        eval_sets.insert(rule.name.clone(), set);
    }

    let runtime = create_tokio_runtime()?;
    let report = runtime.block_on(async {
        let linter = build_linter(&config)?;
        abort_on_ctrl_c(linter.abort_handle().clone());
        Evaluator::new(&linter)
            .with_mode(mode)
            .with_rules_concurrency(config.concurrency.rules)
            .with_files_concurrency(config.concurrency.files)
            .evaluate(&rules, &eval_sets)
            .await
            .into_diagnostic()
    })?;

    if cli.debug_stats {
        print_debug_stats(&report.lint_result);
    }
    output_eval_report(&report, format)?;
    Ok(Outcome::from_eval(&report))
}

/// Keeps the named rules, or all of them when no name is given.
fn select_rules(rules: &[Rule], names: &[String]) -> Result<Vec<Rule>> {
    if names.is_empty() {
        return Ok(rules.to_vec());
    }
    names
        .iter()
        .map(|name| {
            rules
                .iter()
                .find(|rule| &rule.name == name)
                .cloned()
                .ok_or_else(|| miette::miette!("Unknown rule '{}'", name))
        })
        .collect()
}
