//! Store configuration.

use std::path::{Path, PathBuf};

use jsonstash_core::StorageMode;

use crate::error::{StoreError, StoreResult};

pub const ENV_BASE_PATH: &str = "JSONSTASH_BASE_PATH";
pub const ENV_STORAGE_MODE: &str = "JSONSTASH_STORAGE_MODE";
pub const ENV_DEBUG: &str = "JSONSTASH_DEBUG";
pub const ENV_MAX_TASKS: &str = "JSONSTASH_MAX_TASKS";
pub const ENV_PRETTY: &str = "JSONSTASH_PRETTY";

/// Configuration for a [`Stash`](crate::Stash).
///
/// Fixed at construction. The default mode and the debug toggle can be
/// changed later on the stash itself; the base path only through
/// [`Stash::rebase`](crate::Stash::rebase).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for record files and the `versions/` directory.
    pub base_path: PathBuf,
    /// Mode used by `store_default` / `load_default`.
    pub default_mode: StorageMode,
    /// Emit a debug trace for every operation.
    pub debug: bool,
    /// Upper bound on concurrently executing disk tasks. `None` = unbounded.
    pub max_concurrent_tasks: Option<usize>,
    /// Indent JSON records on disk.
    pub pretty_json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            default_mode: StorageMode::CacheThenDisk,
            debug: false,
            max_concurrent_tasks: None,
            pretty_json: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `base_path`.
    #[must_use]
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self::default().with_base_path(base_path)
    }

    /// Sets the base path, dropping any trailing separators.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl AsRef<Path>) -> Self {
        self.base_path = normalize_base_path(base_path.as_ref());
        self
    }

    #[must_use]
    pub fn with_default_mode(mut self, mode: StorageMode) -> Self {
        self.default_mode = mode;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.max_concurrent_tasks = Some(limit);
        self
    }

    #[must_use]
    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    /// Reads overrides from the process environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedMode`] for an unknown storage mode
    /// and [`StoreError::Config`] for malformed flags or numbers.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_BASE_PATH) {
            config = config.with_base_path(path);
        }
        if let Some(mode) = lookup(ENV_STORAGE_MODE) {
            config.default_mode = mode.parse()?;
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            config.debug = parse_flag(ENV_DEBUG, &flag)?;
        }
        if let Some(flag) = lookup(ENV_PRETTY) {
            config.pretty_json = parse_flag(ENV_PRETTY, &flag)?;
        }
        if let Some(limit) = lookup(ENV_MAX_TASKS) {
            let limit: usize = limit.trim().parse().map_err(|_| {
                StoreError::Config(format!("{ENV_MAX_TASKS} must be a non-negative integer, got {limit:?}"))
            })?;
            config.max_concurrent_tasks = (limit > 0).then_some(limit);
        }
        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> StoreResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(StoreError::Config(format!(
            "{name} must be a boolean flag, got {value:?}"
        ))),
    }
}

pub(crate) fn normalize_base_path(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        // "/" stays the root; "" means the working directory.
        if text.is_empty() {
            PathBuf::from(".")
        } else {
            path.to_path_buf()
        }
    } else {
        PathBuf::from(trimmed)
    }
}
