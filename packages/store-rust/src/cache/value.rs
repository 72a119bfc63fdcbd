//! Type-erased values held by the cache.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// A cached value of any caller type.
///
/// The cache is shared by callers storing different types under different
/// keys, so entries are held as `Arc<dyn Any>` together with the name of the
/// stored type. Cloning a `CachedValue` is a reference-count bump; the value
/// itself is never mutated after insertion, so readers can never observe a
/// partially written value.
#[derive(Clone)]
pub struct CachedValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CachedValue {
    /// Wraps `value`, remembering its type name for diagnostics.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the type this value was stored as.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the stored value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Shared handle to the stored `T`, or `None` on a type mismatch.
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Owned copy of the stored `T`, or `None` on a type mismatch.
    #[must_use]
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_stored_type() {
        let cached = CachedValue::new(vec![1u32, 2, 3]);
        assert!(cached.is::<Vec<u32>>());
        assert_eq!(cached.downcast::<Vec<u32>>(), Some(vec![1, 2, 3]));
        assert_eq!(*cached.downcast_arc::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn downcast_to_other_type_is_none() {
        let cached = CachedValue::new("steve".to_string());
        assert!(!cached.is::<u64>());
        assert!(cached.downcast::<u64>().is_none());
        assert!(cached.downcast_arc::<&'static str>().is_none());
    }

    #[test]
    fn type_name_and_debug() {
        let cached = CachedValue::new(42u64);
        assert_eq!(cached.type_name(), "u64");
        assert!(format!("{cached:?}").contains("u64"));
    }

    #[test]
    fn clones_share_the_same_allocation() {
        let cached = CachedValue::new(String::from("shared"));
        let copy = cached.clone();
        let a = cached.downcast_arc::<String>().unwrap();
        let b = copy.downcast_arc::<String>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
