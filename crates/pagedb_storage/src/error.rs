//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the store.
    #[error("read past end of store: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested read offset.
        offset: u64,
        /// Requested read length.
        len: usize,
        /// Current store size.
        size: u64,
    },

    /// Attempted to truncate the store to a larger size.
    #[error("cannot truncate to {requested} bytes, store holds only {size}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current store size.
        size: u64,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}
