//! Rule definitions.

use std::collections::HashSet;
use std::sync::LazyLock;

use promptlint_cache::hash_content;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::LinterError;

static RULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@?[a-zA-Z][a-zA-Z0-9_-]*(/[a-zA-Z][a-zA-Z0-9_-]*)?$")
        .expect("rule name pattern is valid")
});

/// Checks a rule name: an optional `@scope/` prefix followed by a name, each
/// starting with a letter and continuing with letters, digits, `_` or `-`.
pub fn is_valid_rule_name(name: &str) -> bool {
    RULE_NAME.is_match(name)
}

/// What a rule is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Applied independently to every file.
    #[default]
    File,
    /// Applied once to all files together.
    Project,
}

/// A labeled code example attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleExample {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl RuleExample {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: None,
        }
    }
}

/// A natural-language linting policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Unique identifier, see [`is_valid_rule_name`].
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// What the backend is asked to check.
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub scope: RuleScope,

    /// Code that follows the rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_examples: Vec<RuleExample>,

    /// Code that violates the rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incorrect_examples: Vec<RuleExample>,
}

impl Rule {
    /// Creates a file-scoped rule without examples.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            scope: RuleScope::File,
            correct_examples: Vec::new(),
            incorrect_examples: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_scope(mut self, scope: RuleScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_correct_example(mut self, code: impl Into<String>) -> Self {
        self.correct_examples.push(RuleExample::new(code));
        self
    }

    pub fn with_incorrect_example(mut self, code: impl Into<String>) -> Self {
        self.incorrect_examples.push(RuleExample::new(code));
        self
    }

    /// Returns false when there is nothing to ask the backend.
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// Hash over every field that reaches the prompt.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        hash_content(&json)
    }
}

/// Rejects empty rule sets, invalid names and duplicate names.
pub fn validate_rules(rules: &[Rule]) -> Result<(), LinterError> {
    if rules.is_empty() {
        return Err(LinterError::config("No rules configured"));
    }

    let mut seen = HashSet::new();
    for rule in rules {
        if !is_valid_rule_name(&rule.name) {
            return Err(LinterError::config(format!(
                "Invalid rule name '{}'",
                rule.name
            )));
        }
        if !seen.insert(rule.name.as_str()) {
            return Err(LinterError::config(format!(
                "Duplicate rule name '{}'",
                rule.name
            )));
        }
    }
    Ok(())
}
