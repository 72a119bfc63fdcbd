//! Record files on disk.
//!
//! [`FileStore`] maps a key to `<base>/<key>.<ext>` and reads, writes and
//! deletes whole files through `tokio::fs`. It also manages version
//! snapshots under `<base>/versions/`.
//!
//! A `FileStore` is an immutable value (base path + extension) and cheap to
//! clone, so background tasks capture the store they were submitted with and
//! keep writing under that base path even if the coordinator is rebased.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

use super::versions::{self, VERSIONS_DIR};
use crate::error::{IoOp, StoreError, StoreResult};

/// A snapshot file found by [`FileStore::list_versions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
}

/// Path-based record storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base: Arc<PathBuf>,
    extension: &'static str,
}

impl FileStore {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>, extension: &'static str) -> Self {
        Self {
            base: Arc::new(base.into()),
            extension,
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Resolves `key` to its record file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for keys that would escape the base
    /// directory or do not name a file.
    pub fn record_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base.join(format!("{key}.{}", self.extension)))
    }

    /// Overwrites the record file for `key`, creating parent directories
    /// and the file itself as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on permission or disk errors.
    pub async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.record_path(key)?;
        ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(IoOp::Write, &path, e))
    }

    /// Reads the full record file for `key`; `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(IoOp::Read, &path, e)),
        }
    }

    /// Removes the record file for `key`. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be removed.
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.record_path(key)?;
        remove_if_present(&path).await
    }

    /// Whether a record file exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if existence cannot be determined.
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.record_path(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(IoOp::Read, &path, e))
    }

    /// Writes a snapshot of `bytes` stamped with the current local time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory or file cannot be written.
    pub async fn write_version(&self, key: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
        self.write_version_at(key, bytes, Local::now().naive_local())
            .await
    }

    /// Writes a snapshot of `bytes` stamped with `at`.
    ///
    /// A snapshot of the same key within the same second is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory or file cannot be written.
    pub async fn write_version_at(
        &self,
        key: &str,
        bytes: &[u8],
        at: NaiveDateTime,
    ) -> StoreResult<PathBuf> {
        let (dir, leaf) = self.versions_location(key)?;
        let path = dir.join(versions::version_file_name(leaf, at, self.extension));
        ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(IoOp::Write, &path, e))?;
        Ok(path)
    }

    /// Lists the snapshots of `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the versions directory cannot be read.
    pub async fn list_versions(&self, key: &str) -> StoreResult<Vec<VersionEntry>> {
        let (dir, leaf) = self.versions_location(key)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(IoOp::ListDir, &dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(IoOp::ListDir, &dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some((owner, taken_at)) =
                versions::parse_version_file_name(name, self.extension)
            {
                if owner == leaf {
                    found.push(VersionEntry {
                        path: entry.path(),
                        taken_at,
                    });
                }
            }
        }
        found.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then_with(|| a.path.cmp(&b.path)));
        Ok(found)
    }

    /// Removes every snapshot of `key`. Returns how many files were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if listing or removal fails.
    pub async fn delete_versions(&self, key: &str) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in self.list_versions(key).await? {
            if remove_if_present(&entry.path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Directory holding the snapshots of `key`, and the file-name part of
    /// the key that snapshot names start with.
    fn versions_location<'k>(&self, key: &'k str) -> StoreResult<(PathBuf, &'k str)> {
        validate_key(key)?;
        let (parent, leaf) = match key.rsplit_once('/') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        let mut dir = self.base.join(VERSIONS_DIR);
        if let Some(parent) = parent {
            dir.push(parent);
        }
        Ok((dir, leaf))
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason| {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return invalid("key is empty");
    }
    if key.ends_with('/') || key.ends_with('\\') {
        return invalid("key ends with a path separator");
    }
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return invalid("key contains a parent directory component"),
            Component::RootDir | Component::Prefix(_) => return invalid("key is an absolute path"),
        }
    }
    Ok(())
}

async fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(IoOp::CreateDir, parent, e))?;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> StoreResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(IoOp::Delete, path, e)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "json");
        (dir, store)
    }

    fn at(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, s)
            .unwrap()
    }

    #[tokio::test]
    async fn write_then_read_returns_bytes() {
        let (dir, store) = store();
        store.write("player", b"{\"level\":3}").await.unwrap();

        assert!(dir.path().join("player.json").is_file());
        assert_eq!(
            store.read("player").await.unwrap().as_deref(),
            Some(&b"{\"level\":3}"[..])
        );
    }

    #[tokio::test]
    async fn write_creates_nested_directories() {
        let (dir, store) = store();
        store.write("worlds/overworld/spawn", b"[]").await.unwrap();
        assert!(dir.path().join("worlds/overworld/spawn.json").is_file());
    }

    #[tokio::test]
    async fn write_overwrites_full_contents() {
        let (_dir, store) = store();
        store.write("k", b"a much longer first payload").await.unwrap();
        store.write("k", b"short").await.unwrap();
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(&b"short"[..]));
    }

    #[tokio::test]
    async fn read_missing_is_none() {
        let (_dir, store) = store();
        assert!(store.read("nobody").await.unwrap().is_none());
        assert!(!store.exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let (_dir, store) = store();
        store.write("k", b"1").await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn write_under_a_file_fails_with_io_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("occupied");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let store = FileStore::new(&not_a_dir, "json");
        let err = store.write("k", b"1").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { op: IoOp::CreateDir, .. }), "{err}");
    }

    #[tokio::test]
    async fn reading_a_directory_fails_with_io_error() {
        let (dir, store) = store();
        std::fs::create_dir(dir.path().join("weird.json")).unwrap();
        let err = store.read("weird").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { op: IoOp::Read, .. }), "{err}");
    }

    #[test]
    fn rejects_keys_escaping_the_base() {
        let store = FileStore::new("/data", "json");
        for key in ["", "../etc/passwd", "a/../../b", "/abs", "dir/"] {
            let err = store.record_path(key).unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{key}");
        }
        assert_eq!(
            store.record_path("players/steve").unwrap(),
            PathBuf::from("/data/players/steve.json")
        );
    }

    #[tokio::test]
    async fn versions_at_same_second_overwrite() {
        let (_dir, store) = store();
        let first = store.write_version_at("a", b"one", at(1)).await.unwrap();
        let second = store.write_version_at("a", b"two", at(1)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert_eq!(store.list_versions("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn versions_at_different_seconds_coexist() {
        let (dir, store) = store();
        store.write_version_at("a", b"one", at(1)).await.unwrap();
        store.write_version_at("a", b"two", at(2)).await.unwrap();

        let listed = store.list_versions("a").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].taken_at, at(1));
        assert_eq!(listed[1].taken_at, at(2));
        assert!(dir
            .path()
            .join("versions/a_20240601120002.json")
            .is_file());
    }

    #[tokio::test]
    async fn delete_versions_spares_sibling_prefixes() {
        let (dir, store) = store();
        store.write_version_at("a", b"1", at(1)).await.unwrap();
        store.write_version_at("a", b"2", at(2)).await.unwrap();
        store.write_version_at("ab", b"3", at(1)).await.unwrap();
        store.write_version_at("abfile", b"4", at(1)).await.unwrap();
        store.write_version_at("a_b", b"5", at(1)).await.unwrap();

        assert_eq!(store.delete_versions("a").await.unwrap(), 2);

        let versions = dir.path().join("versions");
        assert!(!versions.join("a_20240601120001.json").exists());
        assert!(versions.join("ab_20240601120001.json").is_file());
        assert!(versions.join("abfile_20240601120001.json").is_file());
        assert!(versions.join("a_b_20240601120001.json").is_file());
    }

    #[tokio::test]
    async fn delete_versions_without_directory_is_zero() {
        let (_dir, store) = store();
        assert_eq!(store.delete_versions("a").await.unwrap(), 0);
        assert!(store.list_versions("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nested_keys_version_into_nested_directories() {
        let (dir, store) = store();
        store
            .write_version_at("players/steve", b"{}", at(5))
            .await
            .unwrap();
        assert!(dir
            .path()
            .join("versions/players/steve_20240601120005.json")
            .is_file());
        assert_eq!(store.delete_versions("players/steve").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn write_version_uses_current_time() {
        let (_dir, store) = store();
        let path = store.write_version("now", b"raw bytes").await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(versions::is_version_of(name, "now", "json"), "{name}");
    }
}
