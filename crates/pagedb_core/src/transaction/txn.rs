//! Open transaction handle.

use crate::error::{EngineError, EngineResult};
use crate::handle::{PageHandle, StagedOp};
use crate::path::PagePath;
use crate::transaction::manager::TransactionManager;
use crate::types::{TransactionId, VersionId};
use crate::version::VersionRecord;
use parking_lot::MutexGuard;
use tracing::debug;

/// A unit of atomic mutation against the store.
///
/// Obtained from [`TransactionManager::begin`]; holds the store's
/// mutation guard for its whole lifetime, so reads made through it
/// cannot be invalidated by other writers. Pages are checked out as
/// [`PageHandle`]s, edited in memory, then handed back with
/// [`stage`](Self::stage). Nothing touches disk until
/// [`commit`](Self::commit); dropping the transaction (or calling
/// [`rollback`](Self::rollback)) discards all staged work.
pub struct Transaction<'a> {
    manager: &'a TransactionManager,
    _guard: MutexGuard<'a, ()>,
    id: TransactionId,
    staged: Vec<PageHandle>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        manager: &'a TransactionManager,
        guard: MutexGuard<'a, ()>,
        id: TransactionId,
    ) -> Self {
        Self {
            manager,
            _guard: guard,
            id,
            staged: Vec::new(),
        }
    }

    /// This transaction's identifier.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Number of handles staged so far.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Checks out the current live version of a page for editing.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](EngineError::NotFound) if no live page
    /// exists at the path.
    pub fn open(&mut self, path: impl Into<PagePath>) -> EngineResult<PageHandle> {
        self.manager.load(&path.into())
    }

    /// Checks out a page bound to a specific historical version.
    ///
    /// The commit will fail with a version conflict if `base` is no
    /// longer the page's current version.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](EngineError::NotFound) if the version does
    /// not exist or belongs to a different path.
    pub fn open_at(
        &mut self,
        path: impl Into<PagePath>,
        base: VersionId,
    ) -> EngineResult<PageHandle> {
        self.manager.load_at(&path.into(), base)
    }

    /// Prepares a handle for a page that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ReservedPath`](EngineError::ReservedPath) if the path
    /// is reserved, or
    /// [`DestinationExists`](EngineError::DestinationExists) if a live
    /// page already occupies it.
    pub fn create(&mut self, path: impl Into<PagePath>) -> EngineResult<PageHandle> {
        let path = path.into();
        self.manager.check_reserved(&path)?;
        if self.manager.current_live(&path).is_some() {
            return Err(EngineError::DestinationExists { path });
        }
        Ok(PageHandle::new_page(path))
    }

    /// Adds an edited handle to the staged set.
    ///
    /// # Errors
    ///
    /// Returns [`ReservedPath`](EngineError::ReservedPath) if the
    /// handle would write into a reserved path, or
    /// [`InvalidOperation`](EngineError::InvalidOperation) if the
    /// transaction already writes one of the handle's paths.
    pub fn stage(&mut self, handle: PageHandle) -> EngineResult<()> {
        if matches!(handle.staged_op(), StagedOp::Create) {
            self.manager.check_reserved(handle.path())?;
        }
        if let StagedOp::Move { destination } = handle.staged_op() {
            self.manager.check_reserved(destination)?;
        }

        if let Some(collision) = self.collision(&handle) {
            return Err(EngineError::invalid_operation(format!(
                "transaction writes {collision} more than once"
            )));
        }

        self.staged.push(handle);
        Ok(())
    }

    /// First path the handle writes that an already staged handle also
    /// writes.
    fn collision(&self, handle: &PageHandle) -> Option<PagePath> {
        let mut incoming = vec![handle.path().clone()];
        if let StagedOp::Move { destination } = handle.staged_op() {
            incoming.push(destination.clone());
        }

        incoming.into_iter().find(|path| {
            self.staged.iter().any(|staged| {
                staged.path() == path
                    || matches!(
                        staged.staged_op(),
                        StagedOp::Move { destination } if destination == path
                    )
            })
        })
    }

    /// Validates every staged handle and applies them all, or none.
    ///
    /// On success the staged versions are durable and the returned
    /// records describe them in staging order (a move yields two).
    ///
    /// # Errors
    ///
    /// Any staged handle failing validation fails the whole commit and
    /// leaves the store untouched. See
    /// [`EngineError::is_recoverable`] for the conflict-class errors a
    /// caller may retry after re-reading.
    pub fn commit(self, message: &str) -> EngineResult<Vec<VersionRecord>> {
        self.manager.commit_staged(self.id, &self.staged, message)
    }

    /// Discards all staged work and releases the mutation guard.
    pub fn rollback(self) {
        debug!(txn = %self.id, staged = self.staged.len(), "transaction rolled back");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        // Clear the holder before the guard field unlocks.
        self.manager.release();
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("staged", &self.staged.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::journal::Journal;
    use crate::store::{PathIndex, RecordStore};
    use pagedb_storage::MemoryBackend;
    use std::sync::Arc;

    fn manager() -> TransactionManager {
        TransactionManager::new(
            Arc::new(Journal::new(Box::new(MemoryBackend::new()))),
            Arc::new(RecordStore::new(Box::new(MemoryBackend::new()))),
            Arc::new(PathIndex::new()),
            Config::new(),
        )
    }

    fn seed(manager: &TransactionManager, at: &str, content: &str) -> VersionRecord {
        let mut txn = manager.begin().unwrap();
        let mut page = txn.create(at).unwrap();
        page.set_content(content.as_bytes().to_vec());
        txn.stage(page).unwrap();
        txn.commit("seed").unwrap().remove(0)
    }

    #[test]
    fn open_missing_page_is_not_found() {
        let manager = manager();
        let mut txn = manager.begin().unwrap();
        let err = txn.open("nowhere").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn open_at_rejects_a_version_from_another_path() {
        let manager = manager();
        let a = seed(&manager, "a", "A");
        seed(&manager, "b", "B");

        let mut txn = manager.begin().unwrap();
        let err = txn.open_at("b", a.id).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn open_at_reads_the_historical_base() {
        let manager = manager();
        let first = seed(&manager, "page", "old");

        {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.open("page").unwrap();
            page.set_content(b"new".to_vec());
            txn.stage(page).unwrap();
            txn.commit("edit").unwrap();
        }

        let mut txn = manager.begin().unwrap();
        let page = txn.open_at("page", first.id).unwrap();
        assert_eq!(page.content(), b"old");
        assert_eq!(page.base_version(), Some(first.id));
    }

    #[test]
    fn staging_the_same_path_twice_is_rejected() {
        let manager = manager();
        seed(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let mut a = txn.open("page").unwrap();
        a.set_content(b"x".to_vec());
        let mut b = txn.open("page").unwrap();
        b.set_content(b"y".to_vec());
        txn.stage(a).unwrap();
        let err = txn.stage(b).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation { .. }));
        assert_eq!(txn.staged_count(), 1);
    }

    #[test]
    fn staging_a_create_onto_a_staged_move_destination_is_rejected() {
        let manager = manager();
        seed(&manager, "a", "A");

        let mut txn = manager.begin().unwrap();
        let mut moved = txn.open("a").unwrap();
        moved.move_to("b").unwrap();
        txn.stage(moved).unwrap();

        // "b" is not live yet, so create succeeds; staging collides.
        let mut squatter = txn.create("b").unwrap();
        squatter.set_content(b"taken".to_vec());
        let err = txn.stage(squatter).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation { .. }));
    }

    #[test]
    fn transaction_ids_increase() {
        let manager = manager();
        let first = {
            let txn = manager.begin().unwrap();
            txn.id()
        };
        let second = {
            let txn = manager.begin().unwrap();
            txn.id()
        };
        assert!(second > first);
    }

    #[test]
    fn commit_releases_the_mutation_guard() {
        let manager = manager();
        seed(&manager, "a", "A");
        assert!(!manager.transaction_active());

        // The same thread can begin again immediately.
        let txn = manager.begin().unwrap();
        assert!(manager.transaction_active());
        drop(txn);
        assert!(!manager.transaction_active());
    }
}
