//! Storage coordinator.
//!
//! [`Stash`] is the public entry point. Every operation takes a
//! [`StorageMode`] that decides where the value lives:
//!
//! | Mode | `store` | `load` |
//! |---|---|---|
//! | `MemoryOnly` | cache | cache only |
//! | `DiskOnly` | disk, awaited | cache if present, else disk |
//! | `CacheThenDisk` | cache, then background disk write | cache if present, else disk |
//!
//! A cache entry always short-circuits a disk lookup, whatever the mode.
//! Disk work goes through the [`TaskRunner`], so operations on one key reach
//! the filesystem in the order they were issued.

use std::any::type_name;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use jsonstash_core::{Codec, JsonCodec, StorageMode};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;

use crate::cache::{CacheEngine, CachedValue, HashMapCache};
use crate::config::{normalize_base_path, StoreConfig};
use crate::disk::{FileStore, VersionEntry};
use crate::error::{StoreError, StoreResult};
use crate::observer::{CompositeObserver, DiskOp, PersistenceObserver};
use crate::runner::{TaskHandle, TaskRunner};

/// Values a [`Stash`] can hold: serializable, cloneable and shareable
/// across tasks.
pub trait Storable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Storable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Builder for a [`Stash`] with a custom codec, cache engine, observers or
/// runtime handle.
pub struct StashBuilder<C: Codec = JsonCodec> {
    config: StoreConfig,
    codec: C,
    cache: Option<Arc<dyn CacheEngine>>,
    observers: Vec<Arc<dyn PersistenceObserver>>,
    handle: Option<Handle>,
}

impl StashBuilder<JsonCodec> {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let codec = if config.pretty_json {
            JsonCodec::pretty()
        } else {
            JsonCodec::new()
        };
        Self {
            config,
            codec,
            cache: None,
            observers: Vec::new(),
            handle: None,
        }
    }
}

impl<C: Codec> StashBuilder<C> {
    /// Replaces the codec. The record file extension follows the codec.
    #[must_use]
    pub fn codec<D: Codec>(self, codec: D) -> StashBuilder<D> {
        StashBuilder {
            config: self.config,
            codec,
            cache: self.cache,
            observers: self.observers,
            handle: self.handle,
        }
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheEngine>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn PersistenceObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Spawns disk tasks onto `handle` instead of the current runtime.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Wires the stash together.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if no runtime handle was given and the
    /// call is made outside a tokio runtime, or if the task bound is zero.
    pub fn build(self) -> StoreResult<Stash<C>> {
        let runner = match self.handle {
            Some(handle) => TaskRunner::with_handle(handle, self.config.max_concurrent_tasks)?,
            None => TaskRunner::new(self.config.max_concurrent_tasks)?,
        };
        let files = FileStore::new(self.config.base_path.clone(), self.codec.extension());
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(HashMapCache::new()));

        tracing::debug!(
            base_path = %self.config.base_path.display(),
            default_mode = %self.config.default_mode,
            codec = self.codec.name(),
            "stash opened"
        );

        Ok(Stash {
            cache,
            files: ArcSwap::from_pointee(files),
            runner,
            codec: Arc::new(self.codec),
            observer: Arc::new(CompositeObserver::new(self.observers)),
            default_mode: RwLock::new(self.config.default_mode),
            debug: AtomicBool::new(self.config.debug),
        })
    }
}

/// Key-value store coordinating the cache, the task runner and the file
/// store according to each call's [`StorageMode`].
pub struct Stash<C: Codec = JsonCodec> {
    cache: Arc<dyn CacheEngine>,
    files: ArcSwap<FileStore>,
    runner: TaskRunner,
    codec: Arc<C>,
    observer: Arc<CompositeObserver>,
    default_mode: RwLock<StorageMode>,
    debug: AtomicBool,
}

impl Stash<JsonCodec> {
    /// Opens a JSON-backed stash on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`StashBuilder::build`].
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        StashBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: StoreConfig) -> StashBuilder<JsonCodec> {
        StashBuilder::new(config)
    }
}

impl<C: Codec> Stash<C> {
    // --- Store ---

    /// Stores `value` under `key`.
    ///
    /// - `MemoryOnly`: cache only.
    /// - `DiskOnly`: returns once the record file is written.
    /// - `CacheThenDisk`: the cache is updated before returning; the disk
    ///   write happens in the background and its failure is reported to
    ///   observers.
    ///
    /// # Errors
    ///
    /// `DiskOnly` surfaces encode and I/O failures. Disk modes reject
    /// invalid keys before mutating anything.
    pub async fn store<T: Storable>(
        &self,
        key: &str,
        value: T,
        mode: StorageMode,
    ) -> StoreResult<()> {
        self.trace("store", key, mode);
        match mode {
            StorageMode::MemoryOnly => {
                self.cache.put(key, CachedValue::new(value));
                Ok(())
            }
            StorageMode::DiskOnly => {
                self.files.load().record_path(key)?;
                self.submit_write(key, Arc::new(value), mode).await
            }
            StorageMode::CacheThenDisk => {
                self.files.load().record_path(key)?;
                let cached = CachedValue::new(value);
                let shared = cached
                    .downcast_arc::<T>()
                    .ok_or_else(|| StoreError::cast(key, type_name::<T>(), cached.type_name()))?;
                self.cache.put(key, cached);
                self.submit_write(key, shared, mode).detach();
                Ok(())
            }
        }
    }

    /// Stores `transform(value)` if `validator(&value)` accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] without touching the cache or disk
    /// when the validator rejects; otherwise as [`store`](Self::store).
    pub async fn store_validated<T, V, F>(
        &self,
        key: &str,
        value: T,
        validator: V,
        transform: F,
        mode: StorageMode,
    ) -> StoreResult<()>
    where
        T: Storable,
        V: FnOnce(&T) -> bool,
        F: FnOnce(T) -> T,
    {
        if !validator(&value) {
            self.trace("store rejected", key, mode);
            return Err(StoreError::Validation {
                key: key.to_string(),
            });
        }
        self.store(key, transform(value), mode).await
    }

    /// Stores with the current default mode.
    ///
    /// # Errors
    ///
    /// As [`store`](Self::store).
    pub async fn store_default<T: Storable>(&self, key: &str, value: T) -> StoreResult<()> {
        self.store(key, value, self.default_mode()).await
    }

    // --- Load ---

    /// Loads the value under `key`.
    ///
    /// A cached value is returned without touching disk in every mode.
    /// `MemoryOnly` never reads disk. Otherwise the record file is read and
    /// decoded, and this call waits for that read; disk reads do not
    /// populate the cache.
    ///
    /// # Errors
    ///
    /// [`StoreError::Cast`] if the cached or stored value is not a `T`,
    /// [`StoreError::Io`] if the file cannot be read.
    pub async fn load<T: Storable>(&self, key: &str, mode: StorageMode) -> StoreResult<Option<T>> {
        self.trace("load", key, mode);
        if let Some(value) = self.cached::<T>(key)? {
            return Ok(Some(value));
        }
        match mode {
            StorageMode::MemoryOnly => Ok(None),
            StorageMode::DiskOnly | StorageMode::CacheThenDisk => {
                let (files, codec, observer) = self.task_context();
                let owned = key.to_string();
                self.runner
                    .submit(key, move || read_record::<T, C>(files, codec, observer, owned))
                    .await
            }
        }
    }

    /// Loads the value under `key` and hands the result to `callback`.
    ///
    /// Cache hits and `MemoryOnly` misses call back immediately on the
    /// calling thread. Disk reads call back from a worker task.
    pub fn load_with<T, F>(&self, key: &str, mode: StorageMode, callback: F)
    where
        T: Storable,
        F: FnOnce(StoreResult<Option<T>>) + Send + 'static,
    {
        self.trace("load_with", key, mode);
        match self.cached::<T>(key) {
            Ok(Some(value)) => callback(Ok(Some(value))),
            Err(e) => callback(Err(e)),
            Ok(None) if mode == StorageMode::MemoryOnly => callback(Ok(None)),
            Ok(None) => {
                let (files, codec, observer) = self.task_context();
                let owned = key.to_string();
                self.runner
                    .submit(key, move || async move {
                        callback(read_record::<T, C>(files, codec, observer, owned).await);
                        Ok(())
                    })
                    .detach();
            }
        }
    }

    /// Loads as [`load`](Self::load), then applies `transform` to the
    /// outcome, including an absent value.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load); `transform` is not called on error.
    pub async fn load_transformed<T, U, F>(
        &self,
        key: &str,
        mode: StorageMode,
        transform: F,
    ) -> StoreResult<U>
    where
        T: Storable,
        F: FnOnce(Option<T>) -> U,
    {
        self.load::<T>(key, mode).await.map(transform)
    }

    /// Loads with the current default mode.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load).
    pub async fn load_default<T: Storable>(&self, key: &str) -> StoreResult<Option<T>> {
        self.load(key, self.default_mode()).await
    }

    // --- Delete ---

    /// Removes `key` from the cache and deletes its record file, after any
    /// disk writes already queued for the key.
    ///
    /// Absence from either place is not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file exists but cannot be removed.
    pub async fn clear_data(&self, key: &str) -> StoreResult<()> {
        self.trace_op("clear_data", key);
        self.cache.remove(key);
        self.submit_delete(key).await.map(|_| ())
    }

    /// Deletes the record file for `key` in the background. The cache is
    /// left as is.
    ///
    /// The handle resolves to whether a file was removed; it may be dropped.
    pub fn delete_async(&self, key: &str) -> TaskHandle<bool> {
        self.trace_op("delete_async", key);
        self.submit_delete(key)
    }

    // --- Versions ---

    /// Writes a timestamped snapshot of raw `bytes` for `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the snapshot cannot be written.
    pub async fn save_version(&self, key: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
        self.trace_op("save_version", key);
        self.files.load_full().write_version(key, bytes).await
    }

    /// Encodes `value` with the stash codec and writes it as a snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::Encode`] or [`StoreError::Io`].
    pub async fn save_value_version<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> StoreResult<PathBuf> {
        let bytes = self.codec.encode(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.save_version(key, &bytes).await
    }

    /// Snapshots of `key`, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the versions directory cannot be read.
    pub async fn list_versions(&self, key: &str) -> StoreResult<Vec<VersionEntry>> {
        self.files.load_full().list_versions(key).await
    }

    /// Removes every snapshot of `key`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if listing or removal fails.
    pub async fn delete_version(&self, key: &str) -> StoreResult<usize> {
        self.trace_op("delete_version", key);
        self.files.load_full().delete_versions(key).await
    }

    // --- Lifecycle and settings ---

    /// Waits for every queued disk task to finish.
    pub async fn flush(&self) {
        self.runner.drain().await;
    }

    /// Number of disk tasks not yet finished.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.runner.pending()
    }

    /// Moves the stash to a new base directory.
    ///
    /// Queued tasks are drained first. Tasks keep the base path they were
    /// submitted with, so a write racing this call still lands in the old
    /// directory rather than being split across both.
    pub async fn rebase(&self, base_path: impl AsRef<Path>) {
        self.runner.drain().await;
        let base = normalize_base_path(base_path.as_ref());
        tracing::info!(base_path = %base.display(), "stash rebased");
        self.files
            .store(Arc::new(FileStore::new(base, self.codec.extension())));
    }

    /// Current base directory.
    #[must_use]
    pub fn base_path(&self) -> PathBuf {
        self.files.load().base_path().to_path_buf()
    }

    /// Handle to the file store currently in use.
    #[must_use]
    pub fn file_store(&self) -> Arc<FileStore> {
        self.files.load_full()
    }

    #[must_use]
    pub fn default_mode(&self) -> StorageMode {
        *self.default_mode.read()
    }

    pub fn set_default_mode(&self, mode: StorageMode) {
        *self.default_mode.write() = mode;
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    #[must_use]
    pub fn contains_cached(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    // --- Internals ---

    fn cached<T: Storable>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.cache.get(key) {
            None => Ok(None),
            Some(cached) => cached.downcast::<T>().map(Some).ok_or_else(|| {
                StoreError::cast(key, type_name::<T>(), format!("cached as {}", cached.type_name()))
            }),
        }
    }

    fn task_context(&self) -> (Arc<FileStore>, Arc<C>, Arc<CompositeObserver>) {
        (
            self.files.load_full(),
            Arc::clone(&self.codec),
            Arc::clone(&self.observer),
        )
    }

    fn submit_write<T: Storable>(&self, key: &str, value: Arc<T>, mode: StorageMode) -> TaskHandle<()> {
        let (files, codec, observer) = self.task_context();
        let key_owned = key.to_string();
        self.runner.submit(key, move || async move {
            // A panicking Serialize impl surfaces as TaskAborted.
            let encoded = panic::catch_unwind(AssertUnwindSafe(|| codec.encode(&*value)));
            let result = match encoded {
                Ok(Ok(bytes)) => files.write(&key_owned, &bytes).await,
                Ok(Err(source)) => Err(StoreError::Encode {
                    key: key_owned.clone(),
                    source,
                }),
                Err(_) => Err(StoreError::TaskAborted {
                    key: key_owned.clone(),
                }),
            };
            match &result {
                Ok(()) => observer.on_persisted(&key_owned, mode),
                Err(e) => report_failure(&observer, &key_owned, DiskOp::Write, e),
            }
            result
        })
    }

    fn submit_delete(&self, key: &str) -> TaskHandle<bool> {
        let files = self.files.load_full();
        let observer = Arc::clone(&self.observer);
        let key_owned = key.to_string();
        self.runner.submit(key, move || async move {
            let result = files.delete(&key_owned).await;
            match &result {
                Ok(_) => observer.on_removed(&key_owned),
                Err(e) => report_failure(&observer, &key_owned, DiskOp::Delete, e),
            }
            result
        })
    }

    fn trace(&self, op: &'static str, key: &str, mode: StorageMode) {
        if self.is_debug() {
            tracing::debug!(op, key, %mode, "stash operation");
        }
    }

    /// Trace for operations that do not take a storage mode.
    fn trace_op(&self, op: &'static str, key: &str) {
        if self.is_debug() {
            tracing::debug!(op, key, "stash operation");
        }
    }
}

async fn read_record<T: Storable, C: Codec>(
    files: Arc<FileStore>,
    codec: Arc<C>,
    observer: Arc<CompositeObserver>,
    key: String,
) -> StoreResult<Option<T>> {
    let result = match files.read(&key).await {
        Ok(Some(bytes)) => codec
            .decode::<T>(&bytes)
            .map(Some)
            .map_err(|e| StoreError::cast(&key, type_name::<T>(), e.to_string())),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        report_failure(&observer, &key, DiskOp::Read, e);
    }
    result
}

fn report_failure(observer: &CompositeObserver, key: &str, op: DiskOp, error: &StoreError) {
    tracing::warn!(key, %op, error = %error, "disk operation failed");
    observer.on_failure(key, op, error);
}
