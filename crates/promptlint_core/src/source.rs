//! Source file snapshots.

use promptlint_cache::hash_content;
use serde::{Deserialize, Serialize};

/// Path used for the synthetic file that stands in for a whole project.
pub const PROJECT_PATH: &str = ".";

/// An immutable snapshot of one file under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Repository-relative path.
    pub path: String,
    /// Raw text content.
    pub content: String,
    /// BLAKE3 hash of `content`.
    pub fingerprint: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            fingerprint: hash_content(&content),
            content,
        }
    }

    /// Builds the single input of a project-scoped rule: every file's content
    /// prefixed with a header naming its path.
    pub fn project<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let mut content = String::new();
        for file in files {
            content.push_str("// file: ");
            content.push_str(&file.path);
            content.push('\n');
            content.push_str(&file.content);
            if !file.content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
        }
        Self::new(PROJECT_PATH, content)
    }

    /// Returns true for the synthetic project file.
    pub fn is_project(&self) -> bool {
        self.path == PROJECT_PATH
    }
}
