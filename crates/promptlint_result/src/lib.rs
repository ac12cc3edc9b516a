//! # promptlint_result
//!
//! Value types produced by a promptlint run and the merge operators that fold
//! them together.
//!
//! Both [`LintResult`] and [`EvalStats`] form a commutative monoid:
//!
//! - `Default::default()` is the identity element
//! - [`merge_lint_results`] and [`merge_eval_stats`] are associative
//! - counters commute exactly; error sequences commute up to
//!   [`LintResult::normalized`]
//!
//! Tasks complete out of submission order, so every aggregate in the linter is
//! built by folding these values rather than by mutating shared counters.

mod diagnostic;
mod result;
mod stats;

pub use diagnostic::{Confidence, LintError, Severity};
pub use result::{FailureKind, LintResult, UnexpectedError, merge_lint_results};
pub use stats::{EvalStats, merge_eval_stats};
