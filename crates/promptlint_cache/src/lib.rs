//! # promptlint_cache
//!
//! Persistent result cache for promptlint.
//!
//! Backend calls cost real money, so every completed (file, rule, model)
//! judgment is stored and reused across runs.
//!
//! ## Cache Strategy
//!
//! 1. **Content-addressed**: keys are derived from the file content, the rule
//!    definition and the model configuration, never from paths
//! 2. **Self-invalidating**: editing a rule or bumping the model changes the
//!    key, so stale entries are simply never looked up again
//! 3. **Bounded growth**: superseded entries age out after the configured
//!    maximum age instead of accumulating in the cache file
//! 4. **Completed results only**: in-flight deduplication is the dispatcher's
//!    job, the store only sees finished results
//!
//! ## Storage
//!
//! Entries are kept in memory during a run and flushed to a single `rkyv`
//! file, written atomically.

pub mod entry;
mod error;
mod key;
mod manager;
mod store;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use key::{CacheKey, hash_content};
pub use manager::CacheManager;
pub use store::CacheStore;
