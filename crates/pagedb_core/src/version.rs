//! Immutable version records.

use crate::content::Content;
use crate::error::{EngineError, EngineResult};
use crate::path::PagePath;
use crate::types::{VersionId, VersionKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// One immutable snapshot of a page's full state.
///
/// Records are append-only: once committed they are never modified, and
/// the `predecessor` chain walks a page's history back to its first
/// `Create`. The store hands out decoded copies; mutating a copy cannot
/// touch history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Store-wide unique, monotonically increasing id.
    pub id: VersionId,
    /// Path this version was committed under.
    pub path: PagePath,
    /// Content at this version. Empty for tombstones.
    pub content: Content,
    /// Page attributes at this version.
    pub attributes: BTreeMap<String, String>,
    /// Human-readable commit message.
    pub message: String,
    /// Commit time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Prior version in this page's chain, `None` for the first version.
    pub predecessor: Option<VersionId>,
    /// Mutation kind that produced this version.
    pub kind: VersionKind,
    /// Destination path, set only on the source tombstone of a move.
    pub redirect: Option<PagePath>,
}

impl VersionRecord {
    /// True if this record marks the path as not live: a deletion, or the
    /// source side of a move.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.kind == VersionKind::Delete || self.redirect.is_some()
    }

    /// Opaque cache-validation token for conditional responses.
    ///
    /// Derived from the version id alone, so it is stable across process
    /// restarts and distinct for every committed version. Because no-op
    /// commits are rejected, a path's token changes exactly when its
    /// content or attributes change.
    #[must_use]
    pub fn cache_token(&self) -> String {
        let digest = Sha256::digest(self.id.as_u64().to_string().as_bytes());
        let mut token = String::with_capacity(32);
        for byte in &digest[..16] {
            let _ = write!(token, "{byte:02x}");
        }
        token
    }

    /// Encodes the record body as canonical CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| EngineError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a record body from CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| EngineError::codec(e.to_string()))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Clamps to zero if the clock reads before the epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
