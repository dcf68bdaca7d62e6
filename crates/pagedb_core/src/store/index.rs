//! In-memory path index.

use crate::path::PagePath;
use crate::types::VersionId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// What the index knows about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathEntry {
    /// Most recent version committed under the path.
    pub current: VersionId,
    /// Whether that version ended the page's life here.
    pub tombstone: bool,
}

impl PathEntry {
    /// Entry for a live page.
    #[must_use]
    pub const fn live(current: VersionId) -> Self {
        Self {
            current,
            tombstone: false,
        }
    }

    /// Entry for a deleted or moved-away page.
    #[must_use]
    pub const fn tombstone(current: VersionId) -> Self {
        Self {
            current,
            tombstone: true,
        }
    }
}

/// Maps each path to its current version.
///
/// Lookups take a read lock and never block each other. A commit swings
/// all of its paths under a single write lock, so readers observe either
/// none or all of a transaction's pointer updates.
#[derive(Debug, Default)]
pub struct PathIndex {
    entries: RwLock<HashMap<PagePath, PathEntry>>,
}

impl PathIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live version at a path. `None` when the path has never
    /// existed or its latest version is a tombstone.
    pub fn current_live(&self, path: &PagePath) -> Option<VersionId> {
        let entries = self.entries.read();
        entries
            .get(path)
            .and_then(|entry| (!entry.tombstone).then_some(entry.current))
    }

    /// Latest entry at a path, tombstone or not. History starts here.
    pub fn latest(&self, path: &PagePath) -> Option<PathEntry> {
        self.entries.read().get(path).copied()
    }

    /// Applies all of a commit's pointer updates at once.
    pub fn apply(&self, updates: impl IntoIterator<Item = (PagePath, PathEntry)>) {
        let mut entries = self.entries.write();
        for (path, entry) in updates {
            entries.insert(path, entry);
        }
    }

    /// Replaces the whole index. Used when a store opens.
    pub fn seed(&self, entries: HashMap<PagePath, PathEntry>) {
        *self.entries.write() = entries;
    }

    /// All live paths in sorted order.
    pub fn live_paths(&self) -> Vec<PagePath> {
        let entries = self.entries.read();
        let mut paths: Vec<_> = entries
            .iter()
            .filter(|(_, entry)| !entry.tombstone)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Number of live pages.
    pub fn live_count(&self) -> usize {
        let entries = self.entries.read();
        entries.values().filter(|entry| !entry.tombstone).count()
    }

    /// Number of tracked paths, tombstones included.
    pub fn tracked_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> PagePath {
        PagePath::new(s)
    }

    #[test]
    fn absent_path_has_no_current() {
        let index = PathIndex::new();
        assert_eq!(index.current_live(&path("nope")), None);
        assert_eq!(index.latest(&path("nope")), None);
    }

    #[test]
    fn live_entry_is_visible() {
        let index = PathIndex::new();
        index.apply([(path("home"), PathEntry::live(VersionId::new(4)))]);

        assert_eq!(index.current_live(&path("home")), Some(VersionId::new(4)));
        assert_eq!(
            index.latest(&path("home")),
            Some(PathEntry::live(VersionId::new(4)))
        );
    }

    #[test]
    fn tombstone_hides_current_but_not_latest() {
        let index = PathIndex::new();
        index.apply([(path("gone"), PathEntry::tombstone(VersionId::new(9)))]);

        assert_eq!(index.current_live(&path("gone")), None);
        assert_eq!(
            index.latest(&path("gone")),
            Some(PathEntry::tombstone(VersionId::new(9)))
        );
    }

    #[test]
    fn apply_overwrites_previous_entry() {
        let index = PathIndex::new();
        index.apply([(path("a"), PathEntry::live(VersionId::new(1)))]);
        index.apply([(path("a"), PathEntry::tombstone(VersionId::new(2)))]);

        assert_eq!(index.current_live(&path("a")), None);
        assert_eq!(index.tracked_count(), 1);
    }

    #[test]
    fn live_paths_are_sorted_and_exclude_tombstones() {
        let index = PathIndex::new();
        index.apply([
            (path("b"), PathEntry::live(VersionId::new(2))),
            (path("a/x"), PathEntry::live(VersionId::new(1))),
            (path("c"), PathEntry::tombstone(VersionId::new(3))),
        ]);

        let live = index.live_paths();
        assert_eq!(live, vec![path("a/x"), path("b")]);
        assert_eq!(index.live_count(), 2);
        assert_eq!(index.tracked_count(), 3);
    }

    #[test]
    fn seed_replaces_everything() {
        let index = PathIndex::new();
        index.apply([(path("old"), PathEntry::live(VersionId::new(1)))]);

        let mut fresh = HashMap::new();
        fresh.insert(path("new"), PathEntry::live(VersionId::new(2)));
        index.seed(fresh);

        assert_eq!(index.current_live(&path("old")), None);
        assert_eq!(index.current_live(&path("new")), Some(VersionId::new(2)));
    }
}
