//! # PageDB Core
//!
//! Core page store engine for PageDB.
//!
//! This crate provides:
//! - Path resolution to current and historical page versions
//! - Immutable version records forming full history chains
//! - Transaction management with ACID guarantees
//! - A commit journal for crash recovery
//! - Optimistic concurrency control for lost-update detection
//!
//! ## Example
//!
//! ```rust
//! use pagedb_core::{PageEngine, PagePath};
//!
//! let engine = PageEngine::open_in_memory().unwrap();
//!
//! let mut txn = engine.begin().unwrap();
//! let mut page = txn.create("wiki/home").unwrap();
//! page.set_content(b"# Welcome".to_vec());
//! txn.stage(page).unwrap();
//! txn.commit("initial page").unwrap();
//!
//! let current = engine.resolve(&PagePath::new("wiki/home")).unwrap().unwrap();
//! assert_eq!(current.content.data.as_ref(), b"# Welcome");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod content;
mod dir;
mod engine;
mod error;
mod handle;
mod journal;
mod manifest;
mod mime;
mod patch;
mod path;
mod store;
mod transaction;
mod types;
mod version;

pub use config::{Config, ReservedPathCheck};
pub use content::Content;
pub use dir::StoreDir;
pub use engine::{PageEngine, StoreStats};
pub use error::{EngineError, EngineResult};
pub use handle::PageHandle;
pub use journal::{Journal, JournalIter, JournalRecord, JournalRecordType};
pub use manifest::Manifest;
pub use mime::{mime_for_extension, resolve_mime};
pub use patch::apply_patch;
pub use path::PagePath;
pub use store::{
    History, PageStore, PathEntry, PathIndex, RecordFlags, RecordScan, RecordStore, StoredRecord,
};
pub use transaction::{Transaction, TransactionManager};
pub use types::{TransactionId, VersionId, VersionKind};
pub use version::VersionRecord;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
