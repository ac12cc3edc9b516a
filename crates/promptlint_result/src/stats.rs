//! Evaluation counters for measuring rule quality against labeled files.

use std::iter::Sum;

use serde::{Deserialize, Serialize};

/// Confusion-matrix counters for one or more rules.
///
/// Derived metrics are computed on demand and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvalStats {
    pub num_rules: u64,
    pub num_files: u64,
    pub num_true_positives: u64,
    pub num_false_positives: u64,
    pub num_true_negatives: u64,
    pub num_false_negatives: u64,
    pub num_unexpected_errors: u64,
}

impl EvalStats {
    /// Field-wise sum of two stats.
    #[must_use]
    pub fn merge(self, other: EvalStats) -> EvalStats {
        EvalStats {
            num_rules: self.num_rules + other.num_rules,
            num_files: self.num_files + other.num_files,
            num_true_positives: self.num_true_positives + other.num_true_positives,
            num_false_positives: self.num_false_positives + other.num_false_positives,
            num_true_negatives: self.num_true_negatives + other.num_true_negatives,
            num_false_negatives: self.num_false_negatives + other.num_false_negatives,
            num_unexpected_errors: self.num_unexpected_errors + other.num_unexpected_errors,
        }
    }

    pub fn fold(stats: impl IntoIterator<Item = EvalStats>) -> EvalStats {
        stats.into_iter().fold(EvalStats::default(), EvalStats::merge)
    }

    /// Number of files that landed in one of the four confusion buckets.
    pub fn num_classified(&self) -> u64 {
        self.num_true_positives
            + self.num_false_positives
            + self.num_true_negatives
            + self.num_false_negatives
    }

    /// `tp / (tp + fp)`, or `None` when nothing was flagged.
    pub fn precision(&self) -> Option<f64> {
        ratio(
            self.num_true_positives,
            self.num_true_positives + self.num_false_positives,
        )
    }

    /// `tp / (tp + fn)`, or `None` when there were no incorrect examples.
    pub fn recall(&self) -> Option<f64> {
        ratio(
            self.num_true_positives,
            self.num_true_positives + self.num_false_negatives,
        )
    }

    /// `(tp + tn) / classified`, or `None` when nothing was classified.
    pub fn accuracy(&self) -> Option<f64> {
        ratio(
            self.num_true_positives + self.num_true_negatives,
            self.num_classified(),
        )
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> Option<f64> {
        let precision = self.precision()?;
        let recall = self.recall()?;
        if precision + recall == 0.0 {
            return Some(0.0);
        }
        Some(2.0 * precision * recall / (precision + recall))
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

impl Sum for EvalStats {
    fn sum<I: Iterator<Item = EvalStats>>(iter: I) -> Self {
        EvalStats::fold(iter)
    }
}

/// Merges two eval stats. See [`EvalStats::merge`].
pub fn merge_eval_stats(a: EvalStats, b: EvalStats) -> EvalStats {
    a.merge(b)
}
