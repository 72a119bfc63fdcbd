//! Cache engine trait.
//!
//! Defines [`CacheEngine`], the in-memory key -> value layer shadowing
//! records. Implementations must be safe for unlimited concurrent callers
//! without external locking, and never evict on their own.

use super::value::CachedValue;

/// Concurrent in-memory key-value mapping.
///
/// All operations are synchronous and linearizable per key: a `put` racing a
/// `get` on the same key yields either the old or the new value.
///
/// Wrapped in `Arc<dyn CacheEngine>` for sharing across tasks.
pub trait CacheEngine: Send + Sync + 'static {
    /// Insert or replace a value by key. Returns the previous value if any.
    fn put(&self, key: &str, value: CachedValue) -> Option<CachedValue>;

    /// Retrieve a value by key, or `None` if not present.
    fn get(&self, key: &str) -> Option<CachedValue>;

    /// Remove a value by key, returning the removed value.
    fn remove(&self, key: &str) -> Option<CachedValue>;

    /// Check if a key exists without returning the value.
    fn contains_key(&self, key: &str) -> bool;

    /// Return the number of entries.
    fn len(&self) -> usize;

    /// Check if the cache is empty.
    fn is_empty(&self) -> bool;

    /// Remove every entry.
    fn clear(&self);

    /// Point-in-time snapshot of all keys, in no particular order.
    fn keys(&self) -> Vec<String>;
}
