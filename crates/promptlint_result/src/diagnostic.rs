//! Lint error types reported by rules.

use serde::{Deserialize, Serialize};

/// Severity level for lint errors.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed.
    #[default]
    Error,
    /// Warning - should be reviewed.
    Warning,
}

/// How sure the backend is about a reported violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Parses a confidence marker as emitted by a completion.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// One reported rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(
    feature = "rkyv",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct LintError {
    /// The rule that was violated.
    pub rule_name: String,

    /// Repository-relative path of the offending file.
    pub file_path: String,

    /// Human-readable description of the violation.
    pub message: String,

    /// First line of the offending code (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,

    /// Last line of the offending code (1-based, inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,

    /// The offending code snippet, as quoted by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Severity level.
    #[serde(default)]
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl LintError {
    /// Creates a new lint error with no span.
    pub fn new(
        rule_name: impl Into<String>,
        file_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            file_path: file_path.into(),
            message: message.into(),
            start_line: None,
            end_line: None,
            code: None,
            severity: Severity::Error,
            confidence: None,
        }
    }

    /// Sets the line span. `end` is clamped so it never precedes `start`.
    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end.max(start));
        self
    }

    /// Sets the offending code snippet.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the severity level.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the confidence marker.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_lint_error_new() {
        let err = LintError::new("no-todo", "src/a.ts", "Found TODO");

        assert_eq!(err.rule_name, "no-todo");
        assert_eq!(err.file_path, "src/a.ts");
        assert_eq!(err.message, "Found TODO");
        assert_eq!(err.severity, Severity::Error);
        assert!(err.start_line.is_none());
        assert!(err.confidence.is_none());
    }

    #[test]
    fn test_lint_error_with_lines_clamps_end() {
        let err = LintError::new("rule", "a.ts", "msg").with_lines(10, 3);

        assert_eq!(err.start_line, Some(10));
        assert_eq!(err.end_line, Some(10));
    }

    #[test]
    fn test_lint_error_builders() {
        let err = LintError::new("rule", "a.ts", "msg")
            .with_code("const x = 1")
            .with_severity(Severity::Warning)
            .with_confidence(Confidence::High);

        assert_eq!(err.code.as_deref(), Some("const x = 1"));
        assert_eq!(err.severity, Severity::Warning);
        assert_eq!(err.confidence, Some(Confidence::High));
    }

    #[rstest]
    #[case("low", Some(Confidence::Low))]
    #[case("Medium", Some(Confidence::Medium))]
    #[case(" HIGH ", Some(Confidence::High))]
    #[case("certain", None)]
    #[case("", None)]
    fn test_confidence_parse(#[case] input: &str, #[case] expected: Option<Confidence>) {
        assert_eq!(Confidence::parse(input), expected);
    }

    #[test]
    fn test_lint_error_serialization_skips_empty_fields() {
        let err = LintError::new("rule", "a.ts", "msg");
        let json = serde_json::to_value(&err).unwrap();

        assert!(json.get("start_line").is_none());
        assert!(json.get("code").is_none());
        assert_eq!(json["severity"], "error");
    }
}
