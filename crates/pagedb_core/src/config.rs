//! Store configuration.

use crate::mime::DEFAULT_MIME;
use crate::path::PagePath;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a path belongs to a reserved namespace.
///
/// Supplied by the embedding application (typically backed by its route
/// table). The engine rejects any create or move destination for which
/// this returns true, before the handle is ever staged, and again at the
/// write boundary.
pub trait ReservedPathCheck: Send + Sync {
    /// True if `path` may not be written.
    fn is_reserved(&self, path: &PagePath) -> bool;
}

impl<F> ReservedPathCheck for F
where
    F: Fn(&PagePath) -> bool + Send + Sync,
{
    fn is_reserved(&self, path: &PagePath) -> bool {
        self(path)
    }
}

/// Configuration for opening a page store.
#[derive(Clone)]
pub struct Config {
    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the store already exists.
    pub error_if_exists: bool,

    /// Whether to sync the journal on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Journal size that triggers an automatic checkpoint after commit.
    pub max_journal_size: u64,

    /// MIME type for pages whose extension matches nothing.
    pub default_mime: String,

    /// Format version to stamp into new stores.
    pub format_version: (u16, u16),

    /// Reserved-namespace predicate, if the embedder has one.
    pub reserved: Option<Arc<dyn ReservedPathCheck>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_journal_size: 16 * 1024 * 1024, // 16 MB
            default_mime: DEFAULT_MIME.to_string(),
            format_version: (1, 0),
            reserved: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the store exists.
    #[must_use]
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the journal size that triggers an automatic checkpoint.
    #[must_use]
    pub fn max_journal_size(mut self, size: u64) -> Self {
        self.max_journal_size = size;
        self
    }

    /// Sets the fallback MIME type.
    #[must_use]
    pub fn default_mime(mut self, mime: impl Into<String>) -> Self {
        self.default_mime = mime.into();
        self
    }

    /// Installs the reserved-namespace predicate.
    #[must_use]
    pub fn reserved(mut self, check: impl ReservedPathCheck + 'static) -> Self {
        self.reserved = Some(Arc::new(check));
        self
    }

    /// True if `path` is reserved under this configuration.
    #[must_use]
    pub fn is_reserved(&self, path: &PagePath) -> bool {
        match &self.reserved {
            Some(check) => check.is_reserved(path),
            None => false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("sync_on_commit", &self.sync_on_commit)
            .field("max_journal_size", &self.max_journal_size)
            .field("default_mime", &self.default_mime)
            .field("format_version", &self.format_version)
            .field("reserved", &self.reserved.is_some())
            .finish()
    }
}
