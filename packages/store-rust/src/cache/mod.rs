//! Key-value cache layer.
//!
//! - [`CacheEngine`]: concurrent in-memory mapping trait
//! - [`HashMapCache`]: `DashMap`-backed implementation
//! - [`CachedValue`]: type-erased value handle stored in the cache

mod engine;
mod hashmap;
mod value;

pub use engine::CacheEngine;
pub use hashmap::HashMapCache;
pub use value::CachedValue;
