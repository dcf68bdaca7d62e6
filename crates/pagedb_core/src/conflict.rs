//! Commit-time conflict detection.

use crate::types::VersionId;

/// Outcome of the optimistic concurrency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// The claimed base matches the live state; the write may proceed.
    NoConflict,
    /// The page changed since the caller read it.
    Conflict,
}

/// Compares a handle's claimed base version against the path's live
/// current version.
///
/// `base` is `None` for a new-page handle; `current_live` is `None` when
/// the path has no live version (absent, deleted, or moved away).
///
/// - a new-page handle never conflicts here; whether the path is free
///   is a separate existence check, not a versioning question
/// - an edit whose base is still current proceeds
/// - an edit against a newer version, or against a page deleted under
///   the caller, conflicts
///
/// No locks are held across the caller's read-edit-write gap; this check
/// at commit time is the whole concurrency story.
#[must_use]
pub fn detect(base: Option<VersionId>, current_live: Option<VersionId>) -> ConflictOutcome {
    match base {
        None => ConflictOutcome::NoConflict,
        Some(_) if base == current_live => ConflictOutcome::NoConflict,
        Some(_) => ConflictOutcome::Conflict,
    }
}
