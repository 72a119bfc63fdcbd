//! jsonstash: key-value persistence with in-memory, on-disk and
//! write-behind storage modes.
//!
//! A [`Stash`] stores any serde value under a string key. Each call picks a
//! [`StorageMode`]; disk work runs on a [`TaskRunner`] that keeps operations
//! on one key in submission order while different keys proceed in parallel.
//!
//! ```
//! use jsonstash::{Stash, StorageMode, StoreConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> jsonstash::StoreResult<()> {
//! # let dir = tempfile::TempDir::new().unwrap();
//! # let data_dir = dir.path();
//! let stash = Stash::open(StoreConfig::new(data_dir))?;
//! stash.store("players/steve", vec![1u32, 2, 3], StorageMode::CacheThenDisk).await?;
//! let loaded: Option<Vec<u32>> = stash.load("players/steve", StorageMode::CacheThenDisk).await?;
//! assert_eq!(loaded, Some(vec![1, 2, 3]));
//!
//! stash.flush().await;
//! assert!(data_dir.join("players/steve.json").is_file());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod observer;
pub mod runner;
pub mod stash;
pub mod telemetry;

pub use cache::{CacheEngine, CachedValue, HashMapCache};
pub use config::StoreConfig;
pub use disk::{FileStore, VersionEntry};
pub use error::{IoOp, StoreError, StoreResult};
pub use jsonstash_core::{Codec, CodecError, JsonCodec, MsgPackCodec, StorageMode};
pub use observer::{CompositeObserver, DiskOp, PersistenceObserver};
pub use runner::{TaskHandle, TaskRunner};
pub use stash::{Stash, StashBuilder, Storable};
pub use telemetry::init_tracing;
