//! Cache entry types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use promptlint_result::LintResult;

use crate::CacheKey;

/// A persisted cache record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct CacheEntry {
    /// Hex form of the [`CacheKey`] this entry resolves.
    pub key: String,

    /// The result the key resolved to.
    pub result: LintResult,

    /// Creation time, in seconds since the UNIX epoch.
    pub created_at: u64,
}

impl CacheEntry {
    /// Creates a new cache entry stamped with the current time.
    pub fn new(key: &CacheKey, result: LintResult) -> Self {
        Self {
            key: key.as_str().to_string(),
            result,
            created_at: now_secs(),
        }
    }

    /// True when the entry is older than `max_age` at `now` (epoch seconds).
    pub fn is_expired(&self, now: u64, max_age: Duration) -> bool {
        now.saturating_sub(self.created_at) > max_age.as_secs()
    }

    /// Checks that this entry was stored under `key`.
    pub fn matches(&self, key: &CacheKey) -> bool {
        self.key == key.as_str()
    }
}

/// Current time in seconds since the UNIX epoch.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
