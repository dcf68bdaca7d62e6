//! Immutable page content blobs.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An immutable byte payload with its MIME classification.
///
/// Content is backed by [`Bytes`], so cloning a blob or sharing it between
/// an old and a new version of a page copies a reference, never the
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Raw payload bytes.
    pub data: Bytes,
    /// MIME type, resolved at commit time (attribute override, then path
    /// extension, then the configured default).
    pub mime: String,
}

impl Content {
    /// Creates a content blob.
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Empty content, as held by tombstone records.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            mime: crate::mime::DEFAULT_MIME.to_string(),
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
