//! In-memory [`CacheEngine`] backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. There is
//! no eviction policy: entries stay until explicitly removed.

use dashmap::DashMap;

use super::engine::CacheEngine;
use super::value::CachedValue;

/// Cache backed by [`DashMap`].
///
/// Readers never block each other; writers contend only on the shard that
/// owns their key.
#[derive(Default)]
pub struct HashMapCache {
    entries: DashMap<String, CachedValue>,
}

impl HashMapCache {
    /// Creates a new, empty `HashMapCache`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl CacheEngine for HashMapCache {
    fn put(&self, key: &str, value: CachedValue) -> Option<CachedValue> {
        self.entries.insert(key.to_string(), value)
    }

    fn get(&self, key: &str) -> Option<CachedValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn remove(&self, key: &str) -> Option<CachedValue> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn put_get_remove_round_trip() {
        let cache = HashMapCache::new();

        assert!(cache.put("key1", CachedValue::new(100u64)).is_none());
        assert_eq!(cache.get("key1").unwrap().downcast::<u64>(), Some(100));

        let removed = cache.remove("key1").unwrap();
        assert_eq!(removed.downcast::<u64>(), Some(100));
        assert!(cache.get("key1").is_none());
        assert!(cache.remove("key1").is_none());
    }

    #[test]
    fn put_returns_previous_value() {
        let cache = HashMapCache::new();
        cache.put("k", CachedValue::new("old".to_string()));

        let previous = cache.put("k", CachedValue::new("new".to_string())).unwrap();
        assert_eq!(previous.downcast::<String>().as_deref(), Some("old"));
        assert_eq!(
            cache.get("k").unwrap().downcast::<String>().as_deref(),
            Some("new")
        );
    }

    #[test]
    fn contains_key_reflects_state() {
        let cache = HashMapCache::new();
        assert!(!cache.contains_key("key1"));

        cache.put("key1", CachedValue::new(1u8));
        assert!(cache.contains_key("key1"));

        cache.remove("key1");
        assert!(!cache.contains_key("key1"));
    }

    #[test]
    fn len_keys_and_clear() {
        let cache = HashMapCache::new();
        assert!(cache.is_empty());

        cache.put("a", CachedValue::new(1u8));
        cache.put("b", CachedValue::new("two".to_string()));
        cache.put("c", CachedValue::new(vec![3u8]));
        assert_eq!(cache.len(), 3);

        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn racing_put_and_get_see_old_or_new_value() {
        let cache = Arc::new(HashMapCache::new());
        let old = vec![0u32; 256];
        let new = vec![1u32; 256];
        cache.put("shared", CachedValue::new(old.clone()));

        let writer = {
            let cache = Arc::clone(&cache);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for i in 0..1_000 {
                    let value = if i % 2 == 0 { new.clone() } else { old.clone() };
                    cache.put("shared", CachedValue::new(value));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (old, new) = (old.clone(), new.clone());
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let seen = cache.get("shared").unwrap().downcast::<Vec<u32>>().unwrap();
                        assert!(seen == old || seen == new, "observed a torn value");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let cache = Arc::new(HashMapCache::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        cache.put(&format!("t{t}-k{i}"), CachedValue::new(t * 1_000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 800);
        assert_eq!(cache.get("t3-k42").unwrap().downcast::<u32>(), Some(3_042));
    }
}
