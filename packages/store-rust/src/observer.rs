//! Persistence observer trait and composite implementation.
//!
//! Background disk operations finish after the call that started them has
//! returned, so their outcome is delivered out-of-band to
//! [`PersistenceObserver`]s. [`CompositeObserver`] fans one notification out
//! to every registered observer.

use std::fmt;
use std::sync::Arc;

use jsonstash_core::StorageMode;

use crate::error::StoreError;

/// Disk operation reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOp {
    Write,
    Read,
    Delete,
}

impl fmt::Display for DiskOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Read => "read",
            Self::Delete => "delete",
        })
    }
}

/// Observer for disk outcomes of the storage coordinator.
///
/// Called from worker tasks for background operations and from the caller's
/// task for awaited ones. Implementations must be cheap and non-blocking.
///
/// Used as `Arc<dyn PersistenceObserver>`.
pub trait PersistenceObserver: Send + Sync {
    /// A value for `key` was written to disk.
    fn on_persisted(&self, key: &str, mode: StorageMode);

    /// The record file for `key` was deleted (or was already absent).
    fn on_removed(&self, key: &str);

    /// A disk operation for `key` failed.
    fn on_failure(&self, key: &str, op: DiskOp, error: &StoreError);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PersistenceObserver>>,
}

impl CompositeObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn PersistenceObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn PersistenceObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PersistenceObserver for CompositeObserver {
    fn on_persisted(&self, key: &str, mode: StorageMode) {
        for observer in &self.observers {
            observer.on_persisted(key, mode);
        }
    }

    fn on_removed(&self, key: &str) {
        for observer in &self.observers {
            observer.on_removed(key);
        }
    }

    fn on_failure(&self, key: &str, op: DiskOp, error: &StoreError) {
        for observer in &self.observers {
            observer.on_failure(key, op, error);
        }
    }
}
