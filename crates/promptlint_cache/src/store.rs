//! The storage contract the dispatcher relies on.

use promptlint_result::LintResult;

use crate::{CacheEntry, CacheError, CacheKey};

/// A durable key → result store.
///
/// Implementations must be safe to call from many workers at once. Writes
/// are idempotent: setting the same key twice keeps the later result, and
/// both writers are assumed to hold equivalent results.
pub trait CacheStore: Send + Sync {
    /// Looks up a completed result. Never waits on in-flight work.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores a completed result, overwriting any previous entry.
    fn set(&self, key: &CacheKey, result: &LintResult) -> Result<(), CacheError>;

    /// Durably persists pending writes.
    fn flush(&self) -> Result<(), CacheError>;
}
