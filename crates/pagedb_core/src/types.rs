//! Core type definitions for PageDB.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a committed page version.
///
/// Version IDs are monotonically increasing across the whole store and
/// never reused, so they also order versions within one page's history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionId(pub u64);

impl VersionId {
    /// Creates a new version ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused. They
/// appear in journal frames to tie a commit's records together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// The kind of mutation a version record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionKind {
    /// First version of a path, or recreation after a delete.
    Create,
    /// Content replacement, including patch edits.
    Edit,
    /// Attribute-only change.
    AttributeUpdate,
    /// Either side of a move: the new destination record, or the
    /// redirecting tombstone left at the source.
    Move,
    /// Deletion tombstone.
    Delete,
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::AttributeUpdate => "attribute-update",
            Self::Move => "move",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}
