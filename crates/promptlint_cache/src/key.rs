//! Cache key derivation.

use std::fmt;

/// Computes the BLAKE3 hash of content as lowercase hex.
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Content-addressed key of one lint task.
///
/// Derived from the source file, rule and model fingerprints. Two tasks with
/// equal keys are interchangeable: they are defined to produce equivalent
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key from the three fingerprints.
    ///
    /// Each part is labeled and length-prefixed before hashing so that no two
    /// distinct triples feed the same byte stream to the hasher.
    pub fn new(file_fingerprint: &str, rule_fingerprint: &str, model_fingerprint: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (label, part) in [
            ("file", file_fingerprint),
            ("rule", rule_fingerprint),
            ("model", model_fingerprint),
        ] {
            hasher.update(label.as_bytes());
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Returns the key as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
