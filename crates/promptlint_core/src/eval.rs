//! Rule quality evaluation against labeled fixtures.
//!
//! Every fixture file is linted with its rule and compared with its label:
//!
//! | label       | violations | outcome        |
//! |-------------|------------|----------------|
//! | `correct`   | none       | true negative  |
//! | `correct`   | some       | false positive |
//! | `incorrect` | some       | true positive  |
//! | `incorrect` | none       | false negative |
//!
//! A task that failed counts as an unexpected error and lands in no bucket.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use promptlint_result::{EvalStats, LintResult};
use tracing::{info, warn};

use crate::dispatcher::LintTask;
use crate::pool::bounded_map;
use crate::rule::validate_rules;
use crate::{Linter, LinterError, Rule, RuleScope, SourceFile};

/// Which labeled fixtures to evaluate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvalMode {
    #[default]
    All,
    CorrectOnly,
    IncorrectOnly,
}

impl EvalMode {
    /// Builds the mode from the two CLI switches, which are exclusive.
    pub fn from_flags(only_correct: bool, only_incorrect: bool) -> Result<Self, LinterError> {
        match (only_correct, only_incorrect) {
            (true, true) => Err(LinterError::config(
                "Cannot evaluate only correct and only incorrect examples at once",
            )),
            (true, false) => Ok(Self::CorrectOnly),
            (false, true) => Ok(Self::IncorrectOnly),
            (false, false) => Ok(Self::All),
        }
    }

    pub fn includes(self, label: Label) -> bool {
        match self {
            Self::All => true,
            Self::CorrectOnly => label == Label::Correct,
            Self::IncorrectOnly => label == Label::Incorrect,
        }
    }
}

/// Ground truth of a fixture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// The file follows the rule.
    Correct,
    /// The file violates the rule.
    Incorrect,
}

/// Labeled fixtures of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalSet {
    pub correct: Vec<SourceFile>,
    pub incorrect: Vec<SourceFile>,
}

impl EvalSet {
    pub fn new(correct: Vec<SourceFile>, incorrect: Vec<SourceFile>) -> Self {
        Self { correct, incorrect }
    }

    pub fn len(&self) -> usize {
        self.correct.len() + self.incorrect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn labeled(&self, mode: EvalMode) -> Vec<(Label, &SourceFile)> {
        let correct = self.correct.iter().map(|file| (Label::Correct, file));
        let incorrect = self.incorrect.iter().map(|file| (Label::Incorrect, file));
        correct
            .chain(incorrect)
            .filter(|(label, _)| mode.includes(*label))
            .collect()
    }
}

/// Classifies one task outcome against its label.
pub fn classify(label: Label, result: &LintResult) -> EvalStats {
    let mut stats = EvalStats {
        num_files: 1,
        ..EvalStats::default()
    };
    if result.has_unexpected_errors() {
        stats.num_unexpected_errors = 1;
        return stats;
    }
    match (label, result.is_clean()) {
        (Label::Correct, true) => stats.num_true_negatives = 1,
        (Label::Correct, false) => stats.num_false_positives = 1,
        (Label::Incorrect, false) => stats.num_true_positives = 1,
        (Label::Incorrect, true) => stats.num_false_negatives = 1,
    }
    stats
}

/// Outcome of an evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalReport {
    pub per_rule: BTreeMap<String, EvalStats>,
    pub stats: EvalStats,
    /// Every observed violation and failure, for inspection.
    pub lint_result: LintResult,
}

impl EvalReport {
    /// True when some fixture was misjudged.
    pub fn has_misclassifications(&self) -> bool {
        self.stats.num_false_positives + self.stats.num_false_negatives > 0
    }

    pub fn has_unexpected_errors(&self) -> bool {
        self.stats.num_unexpected_errors > 0
    }
}

/// Runs rules against their labeled fixtures.
pub struct Evaluator<'a> {
    linter: &'a Linter,
    mode: EvalMode,
    rules_concurrency: usize,
    files_concurrency: usize,
}

impl<'a> Evaluator<'a> {
    pub const DEFAULT_RULES_CONCURRENCY: usize = 4;
    pub const DEFAULT_FILES_CONCURRENCY: usize = 8;

    pub fn new(linter: &'a Linter) -> Self {
        Self {
            linter,
            mode: EvalMode::All,
            rules_concurrency: Self::DEFAULT_RULES_CONCURRENCY,
            files_concurrency: Self::DEFAULT_FILES_CONCURRENCY,
        }
    }

    pub fn with_mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rules_concurrency(mut self, concurrency: usize) -> Self {
        self.rules_concurrency = concurrency;
        self
    }

    pub fn with_files_concurrency(mut self, concurrency: usize) -> Self {
        self.files_concurrency = concurrency;
        self
    }

    /// Evaluates every file-scoped rule that has a description. Rules
    /// without an entry in `eval_sets` are evaluated against no files.
    pub async fn evaluate(
        &self,
        rules: &[Rule],
        eval_sets: &HashMap<String, EvalSet>,
    ) -> Result<EvalReport, LinterError> {
        validate_rules(rules)?;
        if self.rules_concurrency == 0 || self.files_concurrency == 0 {
            return Err(LinterError::config("Concurrency must be at least 1"));
        }

        let empty = EvalSet::default();
        let evaluable: Vec<(&Rule, &EvalSet)> = rules
            .iter()
            .filter(|rule| {
                if rule.scope != RuleScope::File {
                    warn!("Skipping rule '{}': only file rules can be evaluated", rule.name);
                    return false;
                }
                if !rule.has_description() {
                    warn!("Skipping rule '{}': it has no description", rule.name);
                    return false;
                }
                true
            })
            .map(|rule| (rule, eval_sets.get(&rule.name).unwrap_or(&empty)))
            .collect();

        let outcomes = bounded_map(evaluable, self.rules_concurrency, |(rule, set)| {
            self.evaluate_rule(rule, set)
        })
        .await;

        let mut report = EvalReport::default();
        let mut lint_results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let (name, stats, lint_result) = outcome?;
            report.per_rule.insert(name, stats);
            lint_results.push(lint_result);
        }
        report.stats = EvalStats::fold(report.per_rule.values().copied());
        report.lint_result = LintResult::fold(lint_results).normalized();

        self.linter.flush_cache().await;

        info!(
            "Evaluated {} rule(s) on {} file(s): {} TP, {} FP, {} TN, {} FN, {} unexpected error(s)",
            report.stats.num_rules,
            report.stats.num_files,
            report.stats.num_true_positives,
            report.stats.num_false_positives,
            report.stats.num_true_negatives,
            report.stats.num_false_negatives,
            report.stats.num_unexpected_errors
        );
        Ok(report)
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        set: &EvalSet,
    ) -> Result<(String, EvalStats, LintResult), LinterError> {
        let labeled = set.labeled(self.mode);
        let shared_rule = Arc::new(rule.clone());
        let tasks = labeled
            .iter()
            .map(|(_, file)| {
                LintTask::new(
                    Arc::new((*file).clone()),
                    Arc::clone(&shared_rule),
                    Arc::clone(self.linter.model()),
                )
            })
            .collect();

        let results = self
            .linter
            .dispatcher()
            .run(tasks, self.files_concurrency)
            .await?;

        for ((label, file), result) in labeled.iter().zip(&results) {
            let outcome = classify(*label, result);
            if outcome.num_false_positives > 0 {
                warn!("{}: false positive on {}", rule.name, file.path);
            } else if outcome.num_false_negatives > 0 {
                warn!("{}: false negative on {}", rule.name, file.path);
            } else if outcome.num_unexpected_errors > 0 {
                warn!("{}: unexpected error on {}", rule.name, file.path);
            }
        }

        let stats = EvalStats::fold(
            labeled
                .iter()
                .zip(&results)
                .map(|((label, _), result)| classify(*label, result)),
        )
        .merge(EvalStats {
            num_rules: 1,
            ..EvalStats::default()
        });

        info!(
            "{}: {} file(s), precision {}, recall {}",
            rule.name,
            stats.num_files,
            format_ratio(stats.precision()),
            format_ratio(stats.recall())
        );

        Ok((rule.name.clone(), stats, LintResult::fold(results)))
    }
}

fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptlint_result::{FailureKind, LintError, UnexpectedError};
    use rstest::rstest;

    #[rstest]
    #[case::both(true, true, None)]
    #[case::correct(true, false, Some(EvalMode::CorrectOnly))]
    #[case::incorrect(false, true, Some(EvalMode::IncorrectOnly))]
    #[case::all(false, false, Some(EvalMode::All))]
    fn test_mode_from_flags(
        #[case] only_correct: bool,
        #[case] only_incorrect: bool,
        #[case] expected: Option<EvalMode>,
    ) {
        let mode = EvalMode::from_flags(only_correct, only_incorrect);
        match expected {
            Some(expected) => assert_eq!(mode.unwrap(), expected),
            None => assert!(matches!(mode, Err(LinterError::Config(_)))),
        }
    }

    fn violation() -> LintResult {
        LintResult::from_errors(vec![LintError::new("r", "f", "bad")])
    }

    fn failure() -> LintResult {
        LintResult::unexpected(UnexpectedError::new(
            "r",
            "f",
            "boom",
            FailureKind::Permanent,
        ))
    }

    #[rstest]
    #[case::true_negative(Label::Correct, LintResult::default(), [0, 0, 1, 0, 0])]
    #[case::false_positive(Label::Correct, violation(), [0, 1, 0, 0, 0])]
    #[case::true_positive(Label::Incorrect, violation(), [1, 0, 0, 0, 0])]
    #[case::false_negative(Label::Incorrect, LintResult::default(), [0, 0, 0, 1, 0])]
    #[case::unexpected_correct(Label::Correct, failure(), [0, 0, 0, 0, 1])]
    #[case::unexpected_incorrect(Label::Incorrect, failure(), [0, 0, 0, 0, 1])]
    fn test_classify(#[case] label: Label, #[case] result: LintResult, #[case] expected: [u64; 5]) {
        let stats = classify(label, &result);

        assert_eq!(stats.num_files, 1);
        assert_eq!(stats.num_rules, 0);
        assert_eq!(
            [
                stats.num_true_positives,
                stats.num_false_positives,
                stats.num_true_negatives,
                stats.num_false_negatives,
                stats.num_unexpected_errors,
            ],
            expected
        );
    }

    #[test]
    fn test_labeled_respects_mode() {
        let set = EvalSet::new(
            vec![SourceFile::new("c1", "a"), SourceFile::new("c2", "b")],
            vec![SourceFile::new("i1", "c")],
        );

        assert_eq!(set.len(), 3);
        assert_eq!(set.labeled(EvalMode::All).len(), 3);
        assert_eq!(set.labeled(EvalMode::CorrectOnly).len(), 2);
        let incorrect = set.labeled(EvalMode::IncorrectOnly);
        assert_eq!(incorrect.len(), 1);
        assert_eq!(incorrect[0].0, Label::Incorrect);
    }

    #[test]
    fn test_report_flags() {
        let mut report = EvalReport::default();
        assert!(!report.has_misclassifications());
        assert!(!report.has_unexpected_errors());

        report.stats.num_false_negatives = 1;
        report.stats.num_unexpected_errors = 2;
        assert!(report.has_misclassifications());
        assert!(report.has_unexpected_errors());
    }
}
