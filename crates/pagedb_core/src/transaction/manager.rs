//! Transaction manager.

use crate::config::Config;
use crate::conflict::{detect, ConflictOutcome};
use crate::content::Content;
use crate::error::{EngineError, EngineResult};
use crate::handle::{PageHandle, StagedOp};
use crate::journal::{Journal, JournalRecord};
use crate::mime::resolve_mime;
use crate::path::PagePath;
use crate::store::{PathEntry, PathIndex, RecordStore, StoredRecord};
use crate::transaction::txn::Transaction;
use crate::types::{TransactionId, VersionId, VersionKind};
use crate::version::{now_millis, VersionRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{debug, info};

/// Coordinates all mutations against the store.
///
/// Writers are fully serialized: [`begin`](Self::begin) hands out the
/// single mutation guard and blocks until any in-flight transaction
/// finishes. A thread that already holds a transaction gets
/// [`TransactionAlreadyActive`](EngineError::TransactionAlreadyActive)
/// instead of deadlocking against itself.
///
/// Commit runs in two phases. Validation inspects every staged handle
/// without touching anything; only if all of them pass does the manager
/// journal the transaction, append the new records, and swing the path
/// index in one step. A validation failure therefore leaves no trace.
pub struct TransactionManager {
    journal: Arc<Journal>,
    records: Arc<RecordStore>,
    index: Arc<PathIndex>,
    config: Config,
    next_version: AtomicU64,
    next_txn: AtomicU64,
    write_lock: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
}

impl TransactionManager {
    /// Creates a manager over empty state.
    pub fn new(
        journal: Arc<Journal>,
        records: Arc<RecordStore>,
        index: Arc<PathIndex>,
        config: Config,
    ) -> Self {
        Self::with_state(journal, records, index, config, 1)
    }

    /// Creates a manager with the version counter seeded from recovery.
    pub fn with_state(
        journal: Arc<Journal>,
        records: Arc<RecordStore>,
        index: Arc<PathIndex>,
        config: Config,
        next_version: u64,
    ) -> Self {
        Self {
            journal,
            records,
            index,
            config,
            next_version: AtomicU64::new(next_version),
            next_txn: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            holder: Mutex::new(None),
        }
    }

    /// Begins a transaction, blocking until exclusive mutation access is
    /// available.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionAlreadyActive`](EngineError::TransactionAlreadyActive)
    /// if the calling thread already holds an open transaction.
    pub fn begin(&self) -> EngineResult<Transaction<'_>> {
        let thread = std::thread::current().id();
        if *self.holder.lock() == Some(thread) {
            return Err(EngineError::TransactionAlreadyActive);
        }

        let guard = self.write_lock.lock();
        *self.holder.lock() = Some(thread);
        let id = TransactionId::new(self.next_txn.fetch_add(1, Ordering::SeqCst));
        debug!(txn = %id, "transaction started");
        Ok(Transaction::new(self, guard, id))
    }

    /// Whether some thread currently holds a transaction.
    #[must_use]
    pub fn transaction_active(&self) -> bool {
        self.holder.lock().is_some()
    }

    pub(crate) fn release(&self) {
        *self.holder.lock() = None;
    }

    pub(crate) fn check_reserved(&self, path: &PagePath) -> EngineResult<()> {
        if self.config.is_reserved(path) {
            return Err(EngineError::reserved(path.clone()));
        }
        Ok(())
    }

    pub(crate) fn current_live(&self, path: &PagePath) -> Option<VersionId> {
        self.index.current_live(path)
    }

    /// Handle bound to the current live version at a path.
    pub(crate) fn load(&self, path: &PagePath) -> EngineResult<PageHandle> {
        let Some(id) = self.index.current_live(path) else {
            return Err(EngineError::not_found(path.clone()));
        };
        let record = self.records.get(id)?.ok_or_else(|| {
            EngineError::invariant(format!("path index points at missing version {id}"))
        })?;
        Ok(PageHandle::from_record(&record))
    }

    /// Handle bound to a specific version, for edits against an older
    /// base. The version must belong to this path.
    pub(crate) fn load_at(&self, path: &PagePath, base: VersionId) -> EngineResult<PageHandle> {
        let Some(record) = self.records.get(base)? else {
            return Err(EngineError::not_found(path.clone()));
        };
        if record.path != *path {
            return Err(EngineError::not_found(path.clone()));
        }
        Ok(PageHandle::from_record(&record))
    }

    /// Validates and applies a transaction's staged handles.
    ///
    /// Called with the mutation guard held by the owning [`Transaction`].
    pub(crate) fn commit_staged(
        &self,
        txn: TransactionId,
        staged: &[PageHandle],
        message: &str,
    ) -> EngineResult<Vec<VersionRecord>> {
        if staged.is_empty() {
            return Err(EngineError::invalid_operation(
                "commit with no staged pages",
            ));
        }

        self.validate(staged)?;
        debug!(txn = %txn, pages = staged.len(), "transaction validated");

        let new_records = self.build_records(staged, message)?;

        self.journal.append(&JournalRecord::Begin { txn })?;
        let mut frames = Vec::with_capacity(new_records.len());
        for record in &new_records {
            let frame = StoredRecord::from_version(record)?.encode();
            self.journal.append(&JournalRecord::Version {
                txn,
                body: frame.clone(),
            })?;
            frames.push((frame, record.id));
        }
        self.journal.append(&JournalRecord::Commit { txn })?;
        self.journal.flush()?;
        if self.config.sync_on_commit {
            self.journal.sync()?;
        }

        for (frame, id) in &frames {
            self.records.append_raw(frame, *id)?;
        }
        self.records.flush()?;
        if self.config.sync_on_commit {
            self.records.sync()?;
        }

        self.index.apply(new_records.iter().map(|record| {
            let entry = if record.is_tombstone() {
                PathEntry::tombstone(record.id)
            } else {
                PathEntry::live(record.id)
            };
            (record.path.clone(), entry)
        }));

        info!(txn = %txn, pages = new_records.len(), "transaction committed");

        if self.config.max_journal_size > 0 && self.journal.size()? > self.config.max_journal_size
        {
            self.checkpoint_inner()?;
        }

        Ok(new_records)
    }

    /// Checks every staged handle without mutating anything.
    fn validate(&self, staged: &[PageHandle]) -> EngineResult<()> {
        let mut written = HashSet::new();

        for handle in staged {
            let path = handle.path();
            if !written.insert(path.clone()) {
                return Err(EngineError::invalid_operation(format!(
                    "transaction writes {path} more than once"
                )));
            }

            match handle.staged_op() {
                StagedOp::Create => {
                    self.check_reserved(path)?;
                    if self.index.current_live(path).is_some() {
                        return Err(EngineError::DestinationExists { path: path.clone() });
                    }
                }
                StagedOp::Update | StagedOp::Delete | StagedOp::Move { .. } => {
                    let current = self.index.current_live(path);
                    let Some(current) = current else {
                        // Deleted (or moved away) since the caller read it.
                        return Err(EngineError::not_found(path.clone()));
                    };
                    if detect(handle.base_version(), Some(current)) == ConflictOutcome::Conflict {
                        return Err(EngineError::conflict(
                            path.clone(),
                            handle.base_version(),
                            Some(current),
                        ));
                    }
                    if matches!(handle.staged_op(), StagedOp::Update) && !handle.is_modified() {
                        return Err(EngineError::no_change(path.clone()));
                    }
                    if let StagedOp::Move { destination } = handle.staged_op() {
                        self.check_reserved(destination)?;
                        if !written.insert(destination.clone()) {
                            return Err(EngineError::invalid_operation(format!(
                                "transaction writes {destination} more than once"
                            )));
                        }
                        if self.index.current_live(destination).is_some() {
                            return Err(EngineError::DestinationExists {
                                path: destination.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Turns validated handles into immutable version records.
    fn build_records(
        &self,
        staged: &[PageHandle],
        message: &str,
    ) -> EngineResult<Vec<VersionRecord>> {
        let timestamp = now_millis();
        let mut records = Vec::new();

        for handle in staged {
            let path = handle.path().clone();
            match handle.staged_op() {
                StagedOp::Create => {
                    // A recreate after delete continues the old chain
                    // through the tombstone.
                    let predecessor = self.index.latest(&path).map(|entry| entry.current);
                    let attributes = handle.effective_attributes();
                    records.push(VersionRecord {
                        id: self.allocate_version(),
                        content: self.make_content(handle, &path, &attributes),
                        attributes,
                        message: message.to_string(),
                        timestamp,
                        predecessor,
                        kind: VersionKind::Create,
                        redirect: None,
                        path,
                    });
                }
                StagedOp::Update => {
                    let kind = if handle.content_changed() {
                        VersionKind::Edit
                    } else {
                        VersionKind::AttributeUpdate
                    };
                    let attributes = handle.effective_attributes();
                    records.push(VersionRecord {
                        id: self.allocate_version(),
                        content: self.make_content(handle, &path, &attributes),
                        attributes,
                        message: message.to_string(),
                        timestamp,
                        predecessor: handle.base_version(),
                        kind,
                        redirect: None,
                        path,
                    });
                }
                StagedOp::Delete => {
                    records.push(VersionRecord {
                        id: self.allocate_version(),
                        content: Content::empty(),
                        attributes: BTreeMap::new(),
                        message: message.to_string(),
                        timestamp,
                        predecessor: handle.base_version(),
                        kind: VersionKind::Delete,
                        redirect: None,
                        path,
                    });
                }
                StagedOp::Move { destination } => {
                    // Two records: a forwarding tombstone at the source
                    // and the page itself at the destination, both
                    // chained to the pre-move version.
                    records.push(VersionRecord {
                        id: self.allocate_version(),
                        path: path.clone(),
                        content: Content::empty(),
                        attributes: BTreeMap::new(),
                        message: message.to_string(),
                        timestamp,
                        predecessor: handle.base_version(),
                        kind: VersionKind::Move,
                        redirect: Some(destination.clone()),
                    });
                    let attributes = handle.effective_attributes();
                    records.push(VersionRecord {
                        id: self.allocate_version(),
                        content: self.make_content(handle, destination, &attributes),
                        attributes,
                        message: message.to_string(),
                        timestamp,
                        predecessor: handle.base_version(),
                        kind: VersionKind::Move,
                        redirect: None,
                        path: destination.clone(),
                    });
                }
            }
        }

        Ok(records)
    }

    /// Content for a record, with its mime type settled: an explicit
    /// `mime` attribute wins, then the path extension, then the
    /// configured default.
    fn make_content(
        &self,
        handle: &PageHandle,
        path: &PagePath,
        attributes: &BTreeMap<String, String>,
    ) -> Content {
        let mime = resolve_mime(path, attributes, &self.config.default_mime);
        Content::new(handle.effective_content(), mime)
    }

    fn allocate_version(&self) -> VersionId {
        VersionId::new(self.next_version.fetch_add(1, Ordering::SeqCst))
    }

    /// Checkpoints the store: syncs the record file, then resets the
    /// journal, whose contents are now redundant.
    ///
    /// Returns the last version id covered, `None` for an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if called from inside an active transaction on
    /// this thread, or if syncing or truncating fails.
    pub fn checkpoint(&self) -> EngineResult<Option<VersionId>> {
        let thread = std::thread::current().id();
        if *self.holder.lock() == Some(thread) {
            return Err(EngineError::invalid_operation(
                "checkpoint inside an active transaction",
            ));
        }
        let _guard = self.write_lock.lock();
        self.checkpoint_inner()
    }

    fn checkpoint_inner(&self) -> EngineResult<Option<VersionId>> {
        self.records.sync()?;

        let last_version = match self.next_version.load(Ordering::SeqCst) {
            0 | 1 => None,
            next => Some(VersionId::new(next - 1)),
        };

        self.journal
            .append(&JournalRecord::Checkpoint { last_version })?;
        self.journal.sync()?;
        self.journal.clear()?;

        info!(last_version = ?last_version, "checkpoint complete");
        Ok(last_version)
    }

    /// The configuration this manager was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The next version id that will be assigned.
    #[must_use]
    pub fn next_version_id(&self) -> VersionId {
        VersionId::new(self.next_version.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_version", &self.next_version.load(Ordering::SeqCst))
            .field("transaction_active", &self.transaction_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PageStore;
    use pagedb_storage::MemoryBackend;

    fn setup() -> (TransactionManager, PageStore) {
        setup_with(Config::new())
    }

    fn setup_with(config: Config) -> (TransactionManager, PageStore) {
        let journal = Arc::new(Journal::new(Box::new(MemoryBackend::new())));
        let records = Arc::new(RecordStore::new(Box::new(MemoryBackend::new())));
        let index = Arc::new(PathIndex::new());
        let store = PageStore::new(Arc::clone(&records), Arc::clone(&index));
        let manager = TransactionManager::new(journal, records, index, config);
        (manager, store)
    }

    fn path(s: &str) -> PagePath {
        PagePath::new(s)
    }

    fn create_page(manager: &TransactionManager, at: &str, content: &str) -> VersionRecord {
        let mut txn = manager.begin().unwrap();
        let mut page = txn.create(at).unwrap();
        page.set_content(content.as_bytes().to_vec());
        txn.stage(page).unwrap();
        let mut committed = txn.commit("create").unwrap();
        committed.remove(0)
    }

    #[test]
    fn create_and_resolve() {
        let (manager, store) = setup();
        let record = create_page(&manager, "wiki/home", "welcome");

        assert_eq!(record.id, VersionId::new(1));
        assert_eq!(record.kind, VersionKind::Create);
        assert_eq!(record.predecessor, None);

        let resolved = store.resolve(&path("wiki/home")).unwrap().unwrap();
        assert_eq!(resolved.content.data.as_ref(), b"welcome");
        assert_eq!(resolved.content.mime, "text/plain");
    }

    #[test]
    fn edit_chains_to_predecessor() {
        let (manager, store) = setup();
        let first = create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.set_content(b"two".to_vec());
        txn.stage(page).unwrap();
        let committed = txn.commit("edit").unwrap();

        assert_eq!(committed[0].kind, VersionKind::Edit);
        assert_eq!(committed[0].predecessor, Some(first.id));

        let ids: Vec<_> = store
            .history(&path("page"))
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![committed[0].id, first.id]);
    }

    #[test]
    fn attribute_only_edit_has_its_own_kind() {
        let (manager, _store) = setup();
        create_page(&manager, "page", "body");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.set_attribute("title", "The Page");
        txn.stage(page).unwrap();
        let committed = txn.commit("retitle").unwrap();

        assert_eq!(committed[0].kind, VersionKind::AttributeUpdate);
        assert_eq!(
            committed[0].attributes.get("title"),
            Some(&"The Page".to_string())
        );
        assert_eq!(committed[0].content.data.as_ref(), b"body");
    }

    #[test]
    fn stale_base_conflicts() {
        let (manager, _store) = setup();
        let first = create_page(&manager, "page", "one");

        // A second writer lands an edit.
        {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.open("page").unwrap();
            page.set_content(b"two".to_vec());
            txn.stage(page).unwrap();
            txn.commit("edit").unwrap();
        }

        // The first writer still bases its edit on the original version.
        let mut txn = manager.begin().unwrap();
        let mut page = txn.open_at("page", first.id).unwrap();
        page.set_content(b"three".to_vec());
        txn.stage(page).unwrap();
        let err = txn.commit("late edit").unwrap_err();

        assert!(matches!(
            err,
            EngineError::VersionConflict { base, current, .. }
                if base == Some(first.id) && current == Some(VersionId::new(2))
        ));
    }

    #[test]
    fn current_base_commits_after_conflicting_writer() {
        let (manager, store) = setup();
        create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.set_content(b"two".to_vec());
        txn.stage(page).unwrap();
        txn.commit("edit").unwrap();

        // Re-reading gives a fresh base; the retry succeeds.
        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.set_content(b"three".to_vec());
        txn.stage(page).unwrap();
        txn.commit("retry").unwrap();

        let resolved = store.resolve(&path("page")).unwrap().unwrap();
        assert_eq!(resolved.content.data.as_ref(), b"three");
    }

    #[test]
    fn editing_a_deleted_page_is_not_found() {
        let (manager, _store) = setup();
        let first = create_page(&manager, "page", "one");

        {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.open("page").unwrap();
            page.delete().unwrap();
            txn.stage(page).unwrap();
            txn.commit("remove").unwrap();
        }

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open_at("page", first.id).unwrap();
        page.set_content(b"resurrect?".to_vec());
        txn.stage(page).unwrap();
        let err = txn.commit("late edit").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn create_over_live_page_is_destination_exists() {
        let (manager, _store) = setup();
        create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let err = txn.create("page").unwrap_err();
        assert!(matches!(err, EngineError::DestinationExists { .. }));
    }

    #[test]
    fn unmodified_update_is_rejected() {
        let (manager, _store) = setup();
        create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let page = txn.open("page").unwrap();
        txn.stage(page).unwrap();
        let err = txn.commit("nothing").unwrap_err();
        assert!(matches!(err, EngineError::NoChange { .. }));
    }

    #[test]
    fn content_restored_to_base_is_no_change() {
        let (manager, _store) = setup();
        create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.set_content(b"different".to_vec());
        page.set_content(b"one".to_vec());
        txn.stage(page).unwrap();
        let err = txn.commit("noop").unwrap_err();
        assert!(matches!(err, EngineError::NoChange { .. }));
    }

    #[test]
    fn delete_tombstones_but_keeps_history() {
        let (manager, store) = setup();
        let first = create_page(&manager, "page", "one");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.delete().unwrap();
        txn.stage(page).unwrap();
        let committed = txn.commit("remove").unwrap();

        assert_eq!(committed[0].kind, VersionKind::Delete);
        assert!(committed[0].is_tombstone());
        assert!(!store.exists(&path("page")));
        assert!(store.resolve(&path("page")).unwrap().is_none());

        // The pre-delete version is still reachable explicitly.
        let old = store
            .resolve_version(&path("page"), first.id)
            .unwrap()
            .unwrap();
        assert_eq!(old.content.data.as_ref(), b"one");

        let kinds: Vec<_> = store
            .history(&path("page"))
            .map(|r| r.unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![VersionKind::Delete, VersionKind::Create]);
    }

    #[test]
    fn recreate_after_delete_chains_through_tombstone() {
        let (manager, store) = setup();
        create_page(&manager, "page", "one");

        let tombstone_id = {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.open("page").unwrap();
            page.delete().unwrap();
            txn.stage(page).unwrap();
            txn.commit("remove").unwrap()[0].id
        };

        let reborn = create_page(&manager, "page", "two");
        assert_eq!(reborn.kind, VersionKind::Create);
        assert_eq!(reborn.predecessor, Some(tombstone_id));

        let resolved = store.resolve(&path("page")).unwrap().unwrap();
        assert_eq!(resolved.content.data.as_ref(), b"two");
    }

    #[test]
    fn move_relocates_content_and_leaves_redirect() {
        let (manager, store) = setup();
        let first = create_page(&manager, "a/b", "C");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("a/b").unwrap();
        page.move_to("a/c").unwrap();
        txn.stage(page).unwrap();
        let committed = txn.commit("rename").unwrap();

        let [tombstone, arrival] = &committed[..] else {
            panic!("move commits two records, got {}", committed.len());
        };
        assert_eq!(tombstone.path, path("a/b"));
        assert_eq!(tombstone.kind, VersionKind::Move);
        assert_eq!(tombstone.redirect, Some(path("a/c")));
        assert!(tombstone.is_tombstone());
        assert_eq!(tombstone.predecessor, Some(first.id));

        assert_eq!(arrival.path, path("a/c"));
        assert_eq!(arrival.kind, VersionKind::Move);
        assert_eq!(arrival.redirect, None);
        assert_eq!(arrival.predecessor, Some(first.id));

        let dest = store.resolve(&path("a/c")).unwrap().unwrap();
        assert_eq!(dest.content.data.as_ref(), b"C");
        assert!(store.resolve(&path("a/b")).unwrap().is_none());

        // Historical source versions stay reachable by id.
        let old = store.resolve_version(&path("a/b"), first.id).unwrap();
        assert!(old.is_some());
    }

    #[test]
    fn move_to_occupied_destination_fails() {
        let (manager, _store) = setup();
        create_page(&manager, "a", "one");
        create_page(&manager, "b", "two");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("a").unwrap();
        page.move_to("b").unwrap();
        txn.stage(page).unwrap();
        let err = txn.commit("collide").unwrap_err();
        assert!(matches!(
            err,
            EngineError::DestinationExists { path } if path.as_str() == "b"
        ));
    }

    #[test]
    fn move_carries_pending_edits_to_destination() {
        let (manager, store) = setup();
        create_page(&manager, "draft", "rough");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("draft").unwrap();
        page.set_content(b"polished".to_vec());
        page.move_to("final").unwrap();
        txn.stage(page).unwrap();
        txn.commit("publish").unwrap();

        let dest = store.resolve(&path("final")).unwrap().unwrap();
        assert_eq!(dest.content.data.as_ref(), b"polished");
    }

    #[test]
    fn history_continues_across_a_move() {
        let (manager, store) = setup();
        create_page(&manager, "old", "body");

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("old").unwrap();
        page.move_to("new").unwrap();
        txn.stage(page).unwrap();
        txn.commit("rename").unwrap();

        let paths: Vec<_> = store
            .history(&path("new"))
            .map(|r| r.unwrap().path)
            .collect();
        assert_eq!(paths, vec![path("new"), path("old")]);
    }

    #[test]
    fn failed_validation_leaves_no_trace() {
        let (manager, store) = setup();
        let first = create_page(&manager, "existing", "body");

        {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.open("existing").unwrap();
            page.set_content(b"newer".to_vec());
            txn.stage(page).unwrap();
            txn.commit("advance").unwrap();
        }
        let pages_before = store.page_count();

        // One good handle, one stale handle. Neither may land.
        let mut txn = manager.begin().unwrap();
        let mut fine = txn.create("fresh").unwrap();
        fine.set_content(b"ok".to_vec());
        let mut doomed = txn.open_at("existing", first.id).unwrap();
        doomed.set_content(b"stale write".to_vec());
        txn.stage(fine).unwrap();
        txn.stage(doomed).unwrap();
        let err = txn.commit("mixed").unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict { .. }));

        assert!(store.resolve(&path("fresh")).unwrap().is_none());
        assert_eq!(store.page_count(), pages_before);
        assert_eq!(manager.next_version_id(), VersionId::new(3));
        let current = store.resolve(&path("existing")).unwrap().unwrap();
        assert_eq!(current.content.data.as_ref(), b"newer");
    }

    #[test]
    fn multi_page_commit_is_atomic_and_shares_timestamp() {
        let (manager, store) = setup();

        let mut txn = manager.begin().unwrap();
        let mut a = txn.create("a").unwrap();
        a.set_content(b"A".to_vec());
        let mut b = txn.create("b").unwrap();
        b.set_content(b"B".to_vec());
        txn.stage(a).unwrap();
        txn.stage(b).unwrap();
        let committed = txn.commit("both").unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].timestamp, committed[1].timestamp);
        assert!(store.exists(&path("a")));
        assert!(store.exists(&path("b")));
    }

    #[test]
    fn empty_commit_is_rejected() {
        let (manager, _store) = setup();
        let txn = manager.begin().unwrap();
        let err = txn.commit("nothing staged").unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation { .. }));
    }

    #[test]
    fn reserved_path_rejected_at_stage() {
        let config = Config::new().reserved(|path: &PagePath| path.as_str().starts_with("sys"));
        let (manager, _store) = setup_with(config);

        let mut txn = manager.begin().unwrap();
        let err = txn.create("sys/internal").unwrap_err();
        assert!(matches!(err, EngineError::ReservedPath { .. }));

        // A move destination inside the reserved namespace is caught too.
        drop(txn);
        create_page(&manager, "page", "body");
        let mut txn = manager.begin().unwrap();
        let mut page = txn.open("page").unwrap();
        page.move_to("sys/page").unwrap();
        let err = txn.stage(page).unwrap_err();
        assert!(matches!(err, EngineError::ReservedPath { .. }));
    }

    #[test]
    fn reentrant_begin_fails_instead_of_deadlocking() {
        let (manager, _store) = setup();
        let txn = manager.begin().unwrap();
        let err = manager.begin().unwrap_err();
        assert!(matches!(err, EngineError::TransactionAlreadyActive));
        drop(txn);

        // After the first transaction ends the thread may begin again.
        let txn = manager.begin().unwrap();
        drop(txn);
    }

    #[test]
    fn rollback_discards_staged_work() {
        let (manager, store) = setup();

        let mut txn = manager.begin().unwrap();
        let mut page = txn.create("ghost").unwrap();
        page.set_content(b"boo".to_vec());
        txn.stage(page).unwrap();
        txn.rollback();

        assert!(store.resolve(&path("ghost")).unwrap().is_none());
        assert!(!manager.transaction_active());
    }

    #[test]
    fn dropping_a_transaction_rolls_back() {
        let (manager, store) = setup();

        {
            let mut txn = manager.begin().unwrap();
            let mut page = txn.create("ghost").unwrap();
            page.set_content(b"boo".to_vec());
            txn.stage(page).unwrap();
        }

        assert!(store.resolve(&path("ghost")).unwrap().is_none());
        assert!(!manager.transaction_active());
    }

    #[test]
    fn commit_journals_begin_versions_commit() {
        let journal = Arc::new(Journal::new(Box::new(MemoryBackend::new())));
        let records = Arc::new(RecordStore::new(Box::new(MemoryBackend::new())));
        let index = Arc::new(PathIndex::new());
        let manager = TransactionManager::new(
            Arc::clone(&journal),
            records,
            index,
            Config::new(),
        );

        create_page(&manager, "page", "body");

        let frames: Vec<_> = journal
            .read_all()
            .unwrap()
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0], JournalRecord::Begin { .. }));
        assert!(matches!(frames[1], JournalRecord::Version { .. }));
        assert!(matches!(frames[2], JournalRecord::Commit { .. }));
    }

    #[test]
    fn oversized_journal_triggers_checkpoint() {
        let journal = Arc::new(Journal::new(Box::new(MemoryBackend::new())));
        let records = Arc::new(RecordStore::new(Box::new(MemoryBackend::new())));
        let index = Arc::new(PathIndex::new());
        let manager = TransactionManager::new(
            Arc::clone(&journal),
            records,
            index,
            Config::new().max_journal_size(64),
        );

        create_page(&manager, "page", "a page large enough to pass the limit");
        assert_eq!(journal.size().unwrap(), 0);
    }

    #[test]
    fn explicit_checkpoint_resets_journal() {
        let journal = Arc::new(Journal::new(Box::new(MemoryBackend::new())));
        let records = Arc::new(RecordStore::new(Box::new(MemoryBackend::new())));
        let index = Arc::new(PathIndex::new());
        let manager = TransactionManager::new(
            Arc::clone(&journal),
            records,
            index,
            Config::new(),
        );

        create_page(&manager, "page", "body");
        assert!(journal.size().unwrap() > 0);

        let last = manager.checkpoint().unwrap();
        assert_eq!(last, Some(VersionId::new(1)));
        assert_eq!(journal.size().unwrap(), 0);
    }

    #[test]
    fn checkpoint_inside_transaction_is_rejected() {
        let (manager, _store) = setup();
        let _txn = manager.begin().unwrap();
        let err = manager.checkpoint().unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation { .. }));
    }

    #[test]
    fn mime_resolution_prefers_attribute_then_extension() {
        let (manager, store) = setup();

        let mut txn = manager.begin().unwrap();
        let mut styled = txn.create("assets/site.css").unwrap();
        styled.set_content(b"body {}".to_vec());
        let mut forced = txn.create("data/blob.css").unwrap();
        forced.set_content(b"not css".to_vec());
        forced.set_attribute("mime", "application/octet-stream");
        txn.stage(styled).unwrap();
        txn.stage(forced).unwrap();
        txn.commit("assets").unwrap();

        let css = store.resolve(&path("assets/site.css")).unwrap().unwrap();
        assert_eq!(css.content.mime, "text/css");

        let blob = store.resolve(&path("data/blob.css")).unwrap().unwrap();
        assert_eq!(blob.content.mime, "application/octet-stream");
    }

    #[test]
    fn version_ids_increase_across_transactions() {
        let (manager, _store) = setup();
        let a = create_page(&manager, "a", "1");
        let b = create_page(&manager, "b", "2");
        assert!(b.id > a.id);
        assert_eq!(manager.next_version_id(), VersionId::new(3));
    }

    #[test]
    fn threads_serialize_through_the_mutation_lock() {
        let (manager, store) = setup();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut txn = manager.begin().unwrap();
                    let mut page = match txn.open("counter") {
                        Ok(page) => page,
                        Err(_) => txn.create("counter").unwrap(),
                    };
                    let mut data = page.content().to_vec();
                    data.push(b'x');
                    page.set_content(data);
                    txn.stage(page).unwrap();
                    txn.commit("append").unwrap();
                });
            }
        });

        let resolved = store.resolve(&path("counter")).unwrap().unwrap();
        assert_eq!(resolved.content.data.as_ref(), b"xxxx");

        let kinds: Vec<_> = store
            .history(&path("counter"))
            .map(|r| r.unwrap().kind)
            .collect();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[3], VersionKind::Create);
    }

    #[test]
    fn conflicts_are_detected_across_threads() {
        let (manager, _store) = setup();
        let base = create_page(&manager, "page", "original");

        std::thread::scope(|scope| {
            let base = base.id;
            let manager = &manager;
            scope.spawn(move || {
                let mut txn = manager.begin().unwrap();
                let mut page = txn.open_at("page", base).unwrap();
                page.set_content(b"from the other thread".to_vec());
                txn.stage(page).unwrap();
                txn.commit("winner").unwrap();
            });
        });

        let mut txn = manager.begin().unwrap();
        let mut page = txn.open_at("page", base.id).unwrap();
        page.set_content(b"stale".to_vec());
        txn.stage(page).unwrap();
        let err = txn.commit("loser").unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict { .. }));
    }
}
