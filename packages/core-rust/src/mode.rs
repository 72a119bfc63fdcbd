//! Storage mode: where a stored value lives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-operation policy selecting whether a value lives in memory, on disk,
/// or both.
///
/// The mode is chosen per call, not per key: two calls against the same key
/// may use different modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageMode {
    /// Cache only. Never touches disk.
    MemoryOnly,
    /// Disk only. Stores wait for the write to land.
    DiskOnly,
    /// Cache first, then an asynchronous write to disk.
    #[default]
    CacheThenDisk,
}

impl StorageMode {
    /// All modes, in declaration order.
    pub const ALL: [StorageMode; 3] = [Self::MemoryOnly, Self::DiskOnly, Self::CacheThenDisk];

    /// Whether a store in this mode updates the cache.
    #[must_use]
    pub fn writes_cache(self) -> bool {
        matches!(self, Self::MemoryOnly | Self::CacheThenDisk)
    }

    /// Whether a store in this mode writes the value to disk.
    #[must_use]
    pub fn writes_disk(self) -> bool {
        matches!(self, Self::DiskOnly | Self::CacheThenDisk)
    }

    /// Canonical upper-case name, as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemoryOnly => "MEMORY_ONLY",
            Self::DiskOnly => "DISK_ONLY",
            Self::CacheThenDisk => "CACHE_THEN_DISK",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A textual storage mode outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported storage mode: {0:?}")]
pub struct UnknownStorageMode(pub String);

impl FromStr for StorageMode {
    type Err = UnknownStorageMode;

    /// Accepts the canonical names case-insensitively, with `-` or `_`
    /// as the word separator (`cache-then-disk`, `DISK_ONLY`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| UnknownStorageMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cache_then_disk() {
        assert_eq!(StorageMode::default(), StorageMode::CacheThenDisk);
    }

    #[test]
    fn cache_and_disk_flags() {
        assert!(StorageMode::MemoryOnly.writes_cache());
        assert!(!StorageMode::MemoryOnly.writes_disk());

        assert!(!StorageMode::DiskOnly.writes_cache());
        assert!(StorageMode::DiskOnly.writes_disk());

        assert!(StorageMode::CacheThenDisk.writes_cache());
        assert!(StorageMode::CacheThenDisk.writes_disk());
    }

    #[test]
    fn parses_canonical_and_relaxed_names() {
        assert_eq!("MEMORY_ONLY".parse(), Ok(StorageMode::MemoryOnly));
        assert_eq!("disk_only".parse(), Ok(StorageMode::DiskOnly));
        assert_eq!(" cache-then-disk ".parse(), Ok(StorageMode::CacheThenDisk));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "WRITE_BEHIND".parse::<StorageMode>().unwrap_err();
        assert_eq!(err, UnknownStorageMode("WRITE_BEHIND".to_string()));
        assert!("".parse::<StorageMode>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for mode in StorageMode::ALL {
            assert_eq!(mode.to_string().parse(), Ok(mode));
        }
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&StorageMode::DiskOnly).unwrap();
        assert_eq!(json, "\"DISK_ONLY\"");

        let err = serde_json::from_str::<StorageMode>("\"SOMETIMES\"");
        assert!(err.is_err());
    }
}
