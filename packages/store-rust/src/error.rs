//! Error type shared by every store operation.

use std::fmt;
use std::path::PathBuf;

use jsonstash_core::{CodecError, UnknownStorageMode};

/// Filesystem operation that produced an [`StoreError::Io`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
    Delete,
    CreateDir,
    ListDir,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::CreateDir => "create dir",
            Self::ListDir => "list dir",
        })
    }
}

/// Errors returned by the cache, file store, task runner and coordinator.
///
/// Absence is never an error: a missing file on read or delete is a valid
/// "nothing there" outcome and is reported as `Ok(None)` / `Ok(())`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A caller-supplied validator rejected the value. Nothing was mutated.
    #[error("validation rejected value for key {key:?}")]
    Validation { key: String },

    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached or decoded data does not match the requested type.
    #[error("value for key {key:?} is not a {expected}: {reason}")]
    Cast {
        key: String,
        expected: &'static str,
        reason: String,
    },

    #[error(transparent)]
    UnsupportedMode(#[from] UnknownStorageMode),

    #[error("failed to encode value for key {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A background task panicked or was dropped before reporting.
    #[error("background task for key {key:?} was aborted")]
    TaskAborted { key: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn cast(key: &str, expected: &'static str, reason: impl Into<String>) -> Self {
        Self::Cast {
            key: key.to_string(),
            expected,
            reason: reason.into(),
        }
    }

    /// Whether this error is a validation rejection.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this error came from the filesystem.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Whether this error is a type mismatch on load.
    #[must_use]
    pub fn is_cast(&self) -> bool {
        matches!(self, Self::Cast { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
