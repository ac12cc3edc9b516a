//! Prompt rendering and completion parsing.
//!
//! The backend is asked to answer with a JSON object:
//!
//! ```json
//! {"violations": [{"line": 3, "end_line": 4, "message": "...", "code": "...", "confidence": "high"}]}
//! ```
//!
//! Anything that does not parse into that shape is a transient failure, so
//! the dispatcher retries it and eventually reports it as an unexpected
//! error. It is never read as "no violations".

use std::fmt::Write as _;
use std::sync::LazyLock;

use promptlint_result::{Confidence, LintError};
use regex::Regex;
use serde::Deserialize;

use crate::backend::BackendError;
use crate::{ModelConfig, Rule, RuleExample, SourceFile};

/// Bumped whenever the rendered text changes, which invalidates the cache.
pub const PROMPT_TEMPLATE_VERSION: &str = "1";

/// Heading that introduces the file under review in the user message.
pub const SOURCE_FILE_HEADING: &str = "## Source file: ";

const SYSTEM_PROMPT: &str = r#"You are an expert code reviewer. You check source code against exactly one lint rule and report every violation of that rule and nothing else.

Respond with a single JSON object and no other text:
{"violations": [{"line": <first line>, "end_line": <last line>, "message": "<why the code violates the rule>", "code": "<offending code>", "confidence": "low" | "medium" | "high"}]}

Line numbers refer to the numbered listing of the source file. Respond with {"violations": []} when the file follows the rule."#;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[a-zA-Z0-9_-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

/// A rendered chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Renders the prompt for one (file, rule) task.
pub fn render_prompt(file: &SourceFile, rule: &Rule, model: &ModelConfig) -> Prompt {
    let mut user = String::new();

    let _ = writeln!(user, "# Rule: {}", rule.name);
    if let Some(title) = &rule.title {
        let _ = writeln!(user, "\n{}", title);
    }
    let _ = writeln!(user, "\n{}", rule.description.trim());

    render_examples(&mut user, "Correct examples", &rule.correct_examples);
    render_examples(&mut user, "Incorrect examples", &rule.incorrect_examples);

    let _ = writeln!(user, "\n{}{}\n", SOURCE_FILE_HEADING, file.path);
    user.push_str("```\n");
    for (index, line) in file.content.lines().enumerate() {
        let _ = writeln!(user, "{:>4}| {}", index + 1, line);
    }
    user.push_str("```\n");

    Prompt {
        system: format!("{SYSTEM_PROMPT}\n\n(prompt v{})", model.prompt_version),
        user,
    }
}

fn render_examples(out: &mut String, heading: &str, examples: &[RuleExample]) {
    if examples.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n## {}", heading);
    for example in examples {
        let _ = writeln!(
            out,
            "\n```{}\n{}\n```",
            example.language.as_deref().unwrap_or(""),
            example.code.trim_end()
        );
    }
}

#[derive(Debug, Deserialize)]
struct CompletionPayload {
    violations: Vec<Violation>,
}

#[derive(Debug, Deserialize)]
struct Violation {
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Pulls the JSON document out of a completion that may wrap it in a fenced
/// code block or surround it with prose.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(captures) = FENCED_BLOCK.captures(trimmed)
        && let Some(body) = captures.get(1)
    {
        return body.as_str().trim();
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parses a completion into the lint errors it reports for `file`.
pub fn parse_completion(
    text: &str,
    file: &SourceFile,
    rule: &Rule,
) -> Result<Vec<LintError>, BackendError> {
    let payload: CompletionPayload = serde_json::from_str(extract_json(text))
        .map_err(|e| BackendError::transient(format!("Malformed completion: {}", e)))?;

    Ok(payload
        .violations
        .into_iter()
        .map(|violation| {
            let mut error = LintError::new(&rule.name, &file.path, violation.message.trim());
            if let Some(line) = violation.line {
                error = error.with_lines(line, violation.end_line.unwrap_or(line));
            }
            if let Some(code) = violation.code.filter(|c| !c.trim().is_empty()) {
                error = error.with_code(code);
            }
            if let Some(confidence) = violation.confidence.as_deref().and_then(Confidence::parse) {
                error = error.with_confidence(confidence);
            }
            error
        })
        .collect())
}
