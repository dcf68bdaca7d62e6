//! Page storage: the record file and the path index over it.
//!
//! Version records live in an immutable, append-only file; once written,
//! a frame is never modified. The path index maps each path to its
//! current version and is rebuilt from the record file when a store opens.
//!
//! ## Record Frame Format
//!
//! ```text
//! | record_len (4) | version_id (8) | path_len (2) | path (N) | flags (1) | payload (M) | crc32 (4) |
//! ```
//!
//! Flags:
//! - `0x01` = tombstone (page deleted or moved away)

mod index;
mod records;

pub use index::{PathEntry, PathIndex};
pub use records::{RecordFlags, RecordScan, RecordStore, StoredRecord};

use crate::error::{EngineError, EngineResult};
use crate::path::PagePath;
use crate::types::VersionId;
use crate::version::VersionRecord;
use std::sync::Arc;

/// Read-side view over the record store and path index.
///
/// All methods here take locks briefly and never wait on a writer's
/// staged work; commits swap the index in one step, so readers see
/// whole transactions or nothing.
#[derive(Debug)]
pub struct PageStore {
    records: Arc<RecordStore>,
    index: Arc<PathIndex>,
}

impl PageStore {
    /// Assembles a store from its shared parts.
    pub(crate) fn new(records: Arc<RecordStore>, index: Arc<PathIndex>) -> Self {
        Self { records, index }
    }

    /// Resolves the current live version at a path.
    ///
    /// Returns `None` for paths that never existed and paths whose
    /// latest version is a tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read.
    pub fn resolve(&self, path: &PagePath) -> EngineResult<Option<VersionRecord>> {
        let Some(id) = self.index.current_live(path) else {
            return Ok(None);
        };
        let record = self.records.get(id)?.ok_or_else(|| {
            EngineError::invariant(format!("path index points at missing version {id}"))
        })?;
        Ok(Some(record))
    }

    /// Resolves a specific historical version at a path.
    ///
    /// The version must have been committed under this exact path;
    /// versions a page had before a move belong to the old path.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read.
    pub fn resolve_version(
        &self,
        path: &PagePath,
        id: VersionId,
    ) -> EngineResult<Option<VersionRecord>> {
        let Some(record) = self.records.get(id)? else {
            return Ok(None);
        };
        if record.path != *path {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Fetches a version record by id alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read.
    pub fn version(&self, id: VersionId) -> EngineResult<Option<VersionRecord>> {
        self.records.get(id)
    }

    /// Checks whether a live page exists at a path.
    pub fn exists(&self, path: &PagePath) -> bool {
        self.index.current_live(path).is_some()
    }

    /// History of a path, newest first.
    ///
    /// Starts at the path's latest version even when that is a
    /// tombstone, and follows predecessor links from there. A page that
    /// was moved here continues into the versions it had at its old
    /// path. An unknown path yields an empty history.
    pub fn history(&self, path: &PagePath) -> History<'_> {
        History {
            records: self.records.as_ref(),
            next: self.index.latest(path).map(|entry| entry.current),
        }
    }

    /// All live paths in sorted order.
    pub fn pages(&self) -> Vec<PagePath> {
        self.index.live_paths()
    }

    /// Number of live pages.
    pub fn page_count(&self) -> usize {
        self.index.live_count()
    }
}

/// Lazy iterator over a page's version chain, newest first.
///
/// Each step reads one record from the store, so walking a long history
/// costs only what the caller consumes.
#[derive(Debug)]
pub struct History<'a> {
    records: &'a RecordStore,
    next: Option<VersionId>,
}

impl Iterator for History<'_> {
    type Item = EngineResult<VersionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.records.get(id) {
            Ok(Some(record)) => {
                self.next = record.predecessor;
                Some(Ok(record))
            }
            Ok(None) => Some(Err(EngineError::record_corruption(format!(
                "version chain references missing record {id}"
            )))),
            Err(err) => Some(Err(err)),
        }
    }
}
