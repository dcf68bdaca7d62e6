//! Staged page mutations.

use crate::error::{EngineError, EngineResult};
use crate::patch::apply_patch;
use crate::path::PagePath;
use crate::types::VersionId;
use crate::version::VersionRecord;
use bytes::Bytes;
use std::collections::BTreeMap;

/// The operation a handle is staged to perform at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StagedOp {
    /// Bring a new page into existence.
    Create,
    /// Replace content and/or attributes of an existing page.
    Update,
    /// Relocate an existing page, leaving a redirect tombstone behind.
    Move {
        /// Normalized destination path.
        destination: PagePath,
    },
    /// Tombstone an existing page.
    Delete,
}

/// A mutable, in-progress view of one page, bound to the base version the
/// caller read.
///
/// Handles are created inside a [`Transaction`](crate::Transaction) via
/// [`open`](crate::Transaction::open) or
/// [`create`](crate::Transaction::create), mutated, then staged. They are
/// never persisted: commit turns each staged handle into immutable
/// [`VersionRecord`]s, and rollback simply drops them.
///
/// Content edits are copy-on-write against the base version, so an
/// untouched handle holds no payload of its own.
#[derive(Debug, Clone)]
pub struct PageHandle {
    path: PagePath,
    base: Option<VersionId>,
    base_content: Bytes,
    base_attributes: BTreeMap<String, String>,
    pending_content: Option<Bytes>,
    pending_attributes: Option<BTreeMap<String, String>>,
    op: StagedOp,
}

impl PageHandle {
    /// Handle for a page that does not exist yet.
    pub(crate) fn new_page(path: PagePath) -> Self {
        Self {
            path,
            base: None,
            base_content: Bytes::new(),
            base_attributes: BTreeMap::new(),
            pending_content: None,
            pending_attributes: None,
            op: StagedOp::Create,
        }
    }

    /// Handle bound to an existing version.
    pub(crate) fn from_record(record: &VersionRecord) -> Self {
        Self {
            path: record.path.clone(),
            base: Some(record.id),
            base_content: record.content.data.clone(),
            base_attributes: record.attributes.clone(),
            pending_content: None,
            pending_attributes: None,
            op: StagedOp::Update,
        }
    }

    /// Path this handle mutates.
    #[must_use]
    pub fn path(&self) -> &PagePath {
        &self.path
    }

    /// The version the caller based this mutation on, `None` for new pages.
    #[must_use]
    pub fn base_version(&self) -> Option<VersionId> {
        self.base
    }

    /// True if this handle creates a page that did not exist.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.base.is_none()
    }

    /// Effective content: pending edit if present, base content otherwise.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        match &self.pending_content {
            Some(pending) => pending,
            None => &self.base_content,
        }
    }

    /// Effective attributes: pending edit if present, base otherwise.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        match &self.pending_attributes {
            Some(pending) => pending,
            None => &self.base_attributes,
        }
    }

    /// Replaces the full content.
    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        self.pending_content = Some(content.into());
    }

    /// Applies a positional patch to the effective content.
    ///
    /// Offset and length clamp to the content bounds; see
    /// [`apply_patch`](crate::patch::apply_patch).
    pub fn patch(&mut self, offset: usize, len: usize, replacement: &[u8]) {
        let patched = apply_patch(self.content(), offset, len, replacement);
        self.pending_content = Some(Bytes::from(patched));
    }

    /// Sets one attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pending_attributes_mut().insert(key.into(), value.into());
    }

    /// Removes one attribute.
    pub fn remove_attribute(&mut self, key: &str) {
        self.pending_attributes_mut().remove(key);
    }

    /// Merges a set of attributes over the effective ones.
    pub fn merge_attributes(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        self.pending_attributes_mut().extend(entries);
    }

    /// Replaces the attribute map wholesale.
    pub fn replace_attributes(&mut self, attributes: BTreeMap<String, String>) {
        self.pending_attributes = Some(attributes);
    }

    /// Stages this page for deletion.
    ///
    /// # Errors
    ///
    /// Rejected on a new page, or after the handle was already retargeted
    /// to a move or delete.
    pub fn delete(&mut self) -> EngineResult<()> {
        if self.is_new() {
            return Err(EngineError::invalid_operation(
                "cannot delete a page that does not exist",
            ));
        }
        if self.op != StagedOp::Update {
            return Err(EngineError::invalid_operation(
                "handle is already staged as a move or delete",
            ));
        }
        self.op = StagedOp::Delete;
        Ok(())
    }

    /// Stages this page for a move to `destination`.
    ///
    /// # Errors
    ///
    /// Rejected on a new page, on a handle already retargeted, and for a
    /// destination equal to the current path (`NoChange`).
    pub fn move_to(&mut self, destination: impl Into<PagePath>) -> EngineResult<()> {
        if self.is_new() {
            return Err(EngineError::invalid_operation(
                "cannot move a page that does not exist",
            ));
        }
        if self.op != StagedOp::Update {
            return Err(EngineError::invalid_operation(
                "handle is already staged as a move or delete",
            ));
        }
        let destination = destination.into();
        if destination == self.path {
            return Err(EngineError::no_change(self.path.clone()));
        }
        self.op = StagedOp::Move { destination };
        Ok(())
    }

    /// True if committing this handle would change the page.
    ///
    /// Creates, moves, and deletes always count as changes; updates count
    /// only when content or attributes differ from the base.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        match self.op {
            StagedOp::Create | StagedOp::Move { .. } | StagedOp::Delete => true,
            StagedOp::Update => self.content_changed() || self.attributes_changed(),
        }
    }

    pub(crate) fn staged_op(&self) -> &StagedOp {
        &self.op
    }

    pub(crate) fn content_changed(&self) -> bool {
        match &self.pending_content {
            Some(pending) => pending != &self.base_content,
            None => false,
        }
    }

    pub(crate) fn attributes_changed(&self) -> bool {
        match &self.pending_attributes {
            Some(pending) => pending != &self.base_attributes,
            None => false,
        }
    }

    /// Effective content as a cheap shared blob.
    pub(crate) fn effective_content(&self) -> Bytes {
        match &self.pending_content {
            Some(pending) => pending.clone(),
            None => self.base_content.clone(),
        }
    }

    /// Effective attributes, cloned for record construction.
    pub(crate) fn effective_attributes(&self) -> BTreeMap<String, String> {
        self.attributes().clone()
    }

    fn pending_attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.pending_attributes
            .get_or_insert_with(|| self.base_attributes.clone())
    }
}
