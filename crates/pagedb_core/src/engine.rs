//! Store facade and recovery.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{EngineError, EngineResult};
use crate::journal::{Journal, JournalRecord};
use crate::manifest::Manifest;
use crate::path::PagePath;
use crate::store::{History, PageStore, PathEntry, PathIndex, RecordStore, StoredRecord};
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{TransactionId, VersionId};
use crate::version::VersionRecord;
use pagedb_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The main page store handle.
///
/// `PageEngine` is the primary entry point for working with a page
/// store. It provides:
/// - Path resolution to current and historical versions
/// - Transactional mutation of pages
/// - Recovery from crashes
///
/// # Opening a Store
///
/// Use `PageEngine::open()` to open a store from a directory path:
///
/// ```rust,ignore
/// use pagedb_core::PageEngine;
/// use std::path::Path;
///
/// // Open or create a store
/// let engine = PageEngine::open(Path::new("wiki_store"))?;
///
/// // Write a page
/// let mut txn = engine.begin()?;
/// let mut page = txn.create("wiki/home")?;
/// page.set_content(b"# Welcome".to_vec());
/// txn.stage(page)?;
/// txn.commit("initial page")?;
///
/// // Close gracefully
/// engine.close()?;
/// ```
///
/// # In-Memory Stores
///
/// For testing, use `PageEngine::open_in_memory()`:
///
/// ```rust,ignore
/// let engine = PageEngine::open_in_memory()?;
/// ```
pub struct PageEngine {
    /// Store directory (holds the lock). None for in-memory stores.
    dir: Option<StoreDir>,
    /// Store manifest.
    manifest: RwLock<Manifest>,
    /// Commit journal.
    journal: Arc<Journal>,
    /// Version record file.
    records: Arc<RecordStore>,
    /// Read-side view over records and the path index.
    store: PageStore,
    /// Transaction manager.
    manager: TransactionManager,
    /// Whether the store is open.
    is_open: RwLock<bool>,
}

impl PageEngine {
    /// Opens a store from a directory path.
    ///
    /// This is the recommended way to open a persistent store. The method:
    /// - Creates the directory if it doesn't exist (unless `create_if_missing` is false)
    /// - Acquires an exclusive lock to prevent concurrent access
    /// - Loads or creates the manifest
    /// - Replays the commit journal if a crash left one behind
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the store locked (`StoreLocked`)
    /// - The store format is incompatible (`InvalidFormat`)
    /// - The record file or journal is corrupt
    /// - I/O errors occur
    pub fn open(path: &Path) -> EngineResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store from a directory path with custom configuration.
    ///
    /// ```rust,ignore
    /// use pagedb_core::{Config, PageEngine};
    /// use std::path::Path;
    ///
    /// let config = Config::new()
    ///     .sync_on_commit(true)
    ///     .default_mime("text/markdown");
    ///
    /// let engine = PageEngine::open_with_config(Path::new("wiki_store"), config)?;
    /// ```
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_config(path: &Path, config: Config) -> EngineResult<Self> {
        use pagedb_storage::FileBackend;

        let dir = StoreDir::open(path, config.create_if_missing)?;

        if !config.create_if_missing && dir.is_new_store() {
            return Err(EngineError::invalid_format(
                "store does not exist and create_if_missing is false",
            ));
        }

        if config.error_if_exists && !dir.is_new_store() {
            return Err(EngineError::invalid_format(
                "store already exists and error_if_exists is true",
            ));
        }

        let manifest = match dir.load_manifest()? {
            Some(m) => {
                if m.format_version.0 != config.format_version.0 {
                    return Err(EngineError::invalid_format(format!(
                        "incompatible format version: store is v{}.{}, expected v{}.{}",
                        m.format_version.0,
                        m.format_version.1,
                        config.format_version.0,
                        config.format_version.1
                    )));
                }
                m
            }
            None => Manifest::new(config.format_version),
        };

        let journal_backend = FileBackend::open_with_create_dirs(&dir.journal_path())?;
        let records_backend = FileBackend::open_with_create_dirs(&dir.records_path())?;

        Self::build(
            config,
            Some(dir),
            manifest,
            Box::new(journal_backend),
            Box::new(records_backend),
        )
    }

    /// Opens a store over pre-configured backends.
    ///
    /// This is a lower-level constructor for when you have your own
    /// backends. For most use cases, prefer [`open`](Self::open) instead.
    ///
    /// # Errors
    ///
    /// Returns an error if recovery fails.
    pub fn open_with_backends(
        config: Config,
        journal_backend: Box<dyn StorageBackend>,
        records_backend: Box<dyn StorageBackend>,
    ) -> EngineResult<Self> {
        let manifest = Manifest::new(config.format_version);
        Self::build(config, None, manifest, journal_backend, records_backend)
    }

    /// Opens a fresh in-memory store for testing.
    ///
    /// Nothing is persisted; all pages are lost when the engine drops.
    ///
    /// # Errors
    ///
    /// Returns an error if recovery fails, which cannot happen for empty
    /// backends.
    pub fn open_in_memory() -> EngineResult<Self> {
        use pagedb_storage::MemoryBackend;
        Self::open_with_backends(
            Config::default(),
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        )
    }

    fn build(
        config: Config,
        dir: Option<StoreDir>,
        manifest: Manifest,
        journal_backend: Box<dyn StorageBackend>,
        records_backend: Box<dyn StorageBackend>,
    ) -> EngineResult<Self> {
        let journal = Arc::new(Journal::new(journal_backend));
        let records = Arc::new(RecordStore::new(records_backend));
        let index = Arc::new(PathIndex::new());

        let next_version = Self::recover(&journal, &records, &index)?;

        let store = PageStore::new(Arc::clone(&records), Arc::clone(&index));
        let manager = TransactionManager::with_state(
            Arc::clone(&journal),
            Arc::clone(&records),
            Arc::clone(&index),
            config,
            next_version,
        );

        Ok(Self {
            dir,
            manifest: RwLock::new(manifest),
            journal,
            records,
            store,
            manager,
            is_open: RwLock::new(true),
        })
    }

    /// Rebuilds in-memory state from the record file, then replays any
    /// committed transactions the journal holds that the record file
    /// does not.
    ///
    /// Returns the next version id to assign.
    ///
    /// On return the record file is authoritative and the journal is
    /// empty: replayed records are synced before the journal is cleared,
    /// and a crash between those two steps only means the next open
    /// replays the same committed records again, which is a no-op.
    fn recover(
        journal: &Journal,
        records: &RecordStore,
        index: &PathIndex,
    ) -> EngineResult<u64> {
        let scan = records.rebuild()?;
        index.seed(
            scan.latest
                .into_iter()
                .map(|(path, (id, tombstone))| {
                    let entry = if tombstone {
                        PathEntry::tombstone(id)
                    } else {
                        PathEntry::live(id)
                    };
                    (path, entry)
                })
                .collect(),
        );

        let mut max_version = scan.max_version.map_or(0, VersionId::as_u64);

        let mut frames = Vec::new();
        let (clean_end, journal_len) = {
            let mut iter = journal.iter()?;
            for result in iter.by_ref() {
                let (_, record) = result?;
                frames.push(record);
            }
            (iter.offset(), iter.size())
        };

        if journal_len == 0 {
            return Ok(max_version + 1);
        }

        // Group record bodies by transaction and note which committed.
        let mut pending: HashMap<TransactionId, Vec<Vec<u8>>> = HashMap::new();
        let mut committed: HashSet<TransactionId> = HashSet::new();
        let mut commit_order: Vec<TransactionId> = Vec::new();
        for record in frames {
            match record {
                JournalRecord::Begin { txn } => {
                    pending.insert(txn, Vec::new());
                }
                JournalRecord::Version { txn, body } => {
                    if let Some(bodies) = pending.get_mut(&txn) {
                        bodies.push(body);
                    }
                }
                JournalRecord::Commit { txn } => {
                    if committed.insert(txn) {
                        commit_order.push(txn);
                    }
                }
                JournalRecord::Checkpoint { .. } => {}
            }
        }

        let dropped = pending
            .keys()
            .filter(|txn| !committed.contains(txn))
            .count();
        if dropped > 0 {
            warn!(
                transactions = dropped,
                "dropping uncommitted journal transactions"
            );
        }
        if clean_end < journal_len {
            warn!(bytes = journal_len - clean_end, "dropping torn journal tail");
        }

        // Replay committed transactions in commit order. Records the
        // file already holds were applied before the crash.
        let mut replayed = 0usize;
        for txn in &commit_order {
            let Some(bodies) = pending.get(txn) else {
                continue;
            };
            for body in bodies {
                let stored = StoredRecord::decode(body)?;
                max_version = max_version.max(stored.version_id.as_u64());
                if records.contains(stored.version_id) {
                    continue;
                }
                records.append_raw(body, stored.version_id)?;
                let entry = if stored.is_tombstone() {
                    PathEntry::tombstone(stored.version_id)
                } else {
                    PathEntry::live(stored.version_id)
                };
                index.apply([(stored.path, entry)]);
                replayed += 1;
            }
        }

        if replayed > 0 {
            records.flush()?;
            info!(records = replayed, "journal replay complete");
        }

        // The record file now owns everything; start the journal fresh.
        records.sync()?;
        journal.clear()?;

        Ok(max_version + 1)
    }

    /// Begins a new transaction, blocking until any in-flight
    /// transaction finishes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreClosed`](EngineError::StoreClosed) after
    /// [`close`](Self::close), or
    /// [`TransactionAlreadyActive`](EngineError::TransactionAlreadyActive)
    /// if this thread already holds one.
    pub fn begin(&self) -> EngineResult<Transaction<'_>> {
        self.ensure_open()?;
        self.manager.begin()
    }

    /// Resolves a path to its current live version.
    ///
    /// Returns `None` for paths that never existed and for deleted or
    /// moved-away pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the record file cannot
    /// be read.
    pub fn resolve(&self, path: &PagePath) -> EngineResult<Option<VersionRecord>> {
        self.ensure_open()?;
        self.store.resolve(path)
    }

    /// Resolves a path to a specific historical version.
    ///
    /// Returns `None` if the version does not exist or belongs to a
    /// different path. Works for deleted and moved-away pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the record file cannot
    /// be read.
    pub fn resolve_version(
        &self,
        path: &PagePath,
        version: VersionId,
    ) -> EngineResult<Option<VersionRecord>> {
        self.ensure_open()?;
        self.store.resolve_version(path, version)
    }

    /// Looks up a version record by id alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the record file cannot
    /// be read.
    pub fn version(&self, id: VersionId) -> EngineResult<Option<VersionRecord>> {
        self.ensure_open()?;
        self.store.version(id)
    }

    /// Whether a live page exists at the path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreClosed`](EngineError::StoreClosed) after
    /// [`close`](Self::close).
    pub fn exists(&self, path: &PagePath) -> EngineResult<bool> {
        self.ensure_open()?;
        Ok(self.store.exists(path))
    }

    /// Iterates a page's versions newest-first, following predecessor
    /// links across moves, deletes, and recreates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreClosed`](EngineError::StoreClosed) after
    /// [`close`](Self::close).
    pub fn history(&self, path: &PagePath) -> EngineResult<History<'_>> {
        self.ensure_open()?;
        Ok(self.store.history(path))
    }

    /// All live page paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreClosed`](EngineError::StoreClosed) after
    /// [`close`](Self::close).
    pub fn pages(&self) -> EngineResult<Vec<PagePath>> {
        self.ensure_open()?;
        Ok(self.store.pages())
    }

    /// Number of live pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.store.page_count()
    }

    /// Number of version records, including historical ones.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.records.record_count()
    }

    /// Creates a checkpoint.
    ///
    /// A checkpoint syncs all committed records and truncates the
    /// journal to reclaim space. After a checkpoint:
    /// - All committed versions are durable in the record file
    /// - The journal is empty
    /// - The manifest records the checkpoint position
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, this thread holds an
    /// open transaction, or an I/O step fails.
    pub fn checkpoint(&self) -> EngineResult<()> {
        self.ensure_open()?;

        let last_version = self.manager.checkpoint()?;

        let mut manifest = self.manifest.write();
        manifest.last_checkpoint = last_version;
        if let Some(ref dir) = self.dir {
            dir.save_manifest(&manifest)?;
        }

        Ok(())
    }

    /// Point-in-time counters for the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or a size cannot be read.
    pub fn stats(&self) -> EngineResult<StoreStats> {
        self.ensure_open()?;
        Ok(StoreStats {
            pages: self.store.page_count(),
            versions: self.records.record_count(),
            journal_bytes: self.journal.size()?,
            record_bytes: self.records.size()?,
            next_version: self.manager.next_version_id(),
            last_checkpoint: self.manifest.read().last_checkpoint,
        })
    }

    /// Closes the store: saves the manifest and flushes both files.
    ///
    /// Further operations fail with
    /// [`StoreClosed`](EngineError::StoreClosed). Closing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a flush or the manifest save fails.
    pub fn close(&self) -> EngineResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }

        if let Some(ref dir) = self.dir {
            let manifest = self.manifest.read();
            dir.save_manifest(&manifest)?;
        }

        self.journal.flush()?;
        self.records.flush()?;

        *is_open = false;
        Ok(())
    }

    /// Checks if the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(EngineError::StoreClosed)
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.manager.config()
    }
}

/// Point-in-time counters reported by [`PageEngine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Live pages.
    pub pages: usize,
    /// Version records, including historical ones.
    pub versions: usize,
    /// Bytes currently in the commit journal.
    pub journal_bytes: u64,
    /// Bytes in the version record file.
    pub record_bytes: u64,
    /// Next version id to be assigned.
    pub next_version: VersionId,
    /// Last checkpointed version, if any.
    pub last_checkpoint: Option<VersionId>,
}

impl std::fmt::Debug for PageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageEngine")
            .field("is_open", &self.is_open())
            .field("pages", &self.page_count())
            .field("versions", &self.version_count())
            .finish_non_exhaustive()
    }
}

impl Drop for PageEngine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
