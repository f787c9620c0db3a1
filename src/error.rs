//! Error types for diskmemo
//!
//! Only failures that the cache cannot recover from locally surface here.
//! Corrupt entries, eviction races, and directory-prune failures are
//! handled inside the cache and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache operations
pub type MemoResult<T> = Result<T, MemoError>;

/// Errors surfaced by cache operations
#[derive(Error, Debug)]
pub enum MemoError {
    /// Persisting a freshly computed entry failed: the namespace directory
    /// could not be created, the temporary file could not be staged, or the
    /// atomic rename onto the final path failed. The final path is left
    /// untouched; no partial entry is ever visible there.
    #[error("Failed to persist cache entry {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The supplied producer failed. The failure passes through to the
    /// caller unchanged; the cache neither retries nor unwraps it.
    #[error("Producer failed: {source}")]
    Producer {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MemoError {
    /// Create a storage write error for the entry path it concerns
    pub fn storage_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageWrite {
            path: path.into(),
            source,
        }
    }

    /// Wrap a producer failure for propagation through the lookup path
    pub fn producer(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Producer {
            source: source.into(),
        }
    }
}
