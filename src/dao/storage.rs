use std::{io, path::PathBuf};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by save stores regardless of the backing medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The journal file could not be opened, read or appended to.
    #[error("save journal `{path}` is unavailable")]
    Journal {
        /// Journal file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A journal line or an incoming record could not be (de)serialized.
    #[error("save journal `{path}` holds an unreadable record at line {line}")]
    Corrupted {
        /// Journal file.
        path: PathBuf,
        /// 1-based line number of the bad record.
        line: usize,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Encoding a record before writing it failed.
    #[error("failed to encode save record")]
    Encode(#[source] serde_json::Error),
}

impl StorageError {
    /// Construct a journal error for the given path.
    pub fn journal(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Journal {
            path: path.into(),
            source,
        }
    }
}
