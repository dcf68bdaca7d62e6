//! Error types for the PageDB engine.

use crate::path::PagePath;
use crate::types::VersionId;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in PageDB engine operations.
///
/// The first six variants form the recoverable commit taxonomy: the
/// transaction is rolled back and the caller may retry with a fresh base
/// version. The remainder are ambient storage, format, and lifecycle
/// failures, plus [`InvariantViolation`](EngineError::InvariantViolation)
/// for internal inconsistencies that must never be folded into the
/// recoverable set.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Page or version not found.
    #[error("page not found: {path}")]
    NotFound {
        /// The path that failed to resolve.
        path: PagePath,
    },

    /// Optimistic concurrency failure: the page changed under the caller.
    #[error("version conflict on {path}: base {base:?}, current {current:?}")]
    VersionConflict {
        /// The path being mutated.
        path: PagePath,
        /// The version the caller based its edit on, if any.
        base: Option<VersionId>,
        /// The version currently live at the path, if any.
        current: Option<VersionId>,
    },

    /// The staged mutation leaves the page byte-identical to its base.
    #[error("no change to commit for {path}")]
    NoChange {
        /// The path with nothing to commit.
        path: PagePath,
    },

    /// The path is reserved by the embedding application.
    #[error("path is reserved: {path}")]
    ReservedPath {
        /// The rejected path.
        path: PagePath,
    },

    /// The target of a create or move already resolves to a live page.
    #[error("a live page already exists at {path}")]
    DestinationExists {
        /// The occupied path.
        path: PagePath,
    },

    /// A transaction is already active on this thread.
    #[error("a transaction is already active on this thread")]
    TransactionAlreadyActive,

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] pagedb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encode or decode failure.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Journal is corrupted or invalid.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Record store is corrupted or invalid.
    #[error("record store corruption: {message}")]
    RecordCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Invalid store format or unsupported version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Internal invariant broken. Indicates a bug, not a caller mistake.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant.
        message: String,
    },
}

impl EngineError {
    /// Creates a not-found error for a path.
    pub fn not_found(path: PagePath) -> Self {
        Self::NotFound { path }
    }

    /// Creates a version conflict error.
    pub fn conflict(path: PagePath, base: Option<VersionId>, current: Option<VersionId>) -> Self {
        Self::VersionConflict {
            path,
            base,
            current,
        }
    }

    /// Creates a no-change error for a path.
    pub fn no_change(path: PagePath) -> Self {
        Self::NoChange { path }
    }

    /// Creates a reserved-path error.
    pub fn reserved(path: PagePath) -> Self {
        Self::ReservedPath { path }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates a record store corruption error.
    pub fn record_corruption(message: impl Into<String>) -> Self {
        Self::RecordCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// True if this error is part of the recoverable commit taxonomy.
    ///
    /// Recoverable errors mean the transaction was rolled back cleanly and
    /// the caller may retry against a fresh base version.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::VersionConflict { .. }
                | Self::NoChange { .. }
                | Self::ReservedPath { .. }
                | Self::DestinationExists { .. }
                | Self::TransactionAlreadyActive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_taxonomy() {
        let path = PagePath::new("a/b");
        assert!(EngineError::not_found(path.clone()).is_recoverable());
        assert!(EngineError::no_change(path.clone()).is_recoverable());
        assert!(EngineError::TransactionAlreadyActive.is_recoverable());
        assert!(!EngineError::invariant("index points at missing record").is_recoverable());
        assert!(!EngineError::journal_corruption("bad magic").is_recoverable());
    }

    #[test]
    fn conflict_display_names_path() {
        let err = EngineError::conflict(
            PagePath::new("wiki/home"),
            Some(VersionId::new(3)),
            Some(VersionId::new(4)),
        );
        let text = err.to_string();
        assert!(text.contains("wiki/home"));
        assert!(text.contains("conflict"));
    }
}
