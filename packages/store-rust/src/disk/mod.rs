//! On-disk persistence: record files and version snapshots.

mod file_store;
pub mod versions;

pub use file_store::{FileStore, VersionEntry};
