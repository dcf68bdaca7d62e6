//! # PageDB Storage
//!
//! Storage backend trait and implementations for PageDB.
//!
//! This crate provides the lowest-level storage abstraction for PageDB.
//! Backends are **opaque append-only byte stores** - they never interpret
//! the data they hold. All framing, checksums, and record formats live in
//! `pagedb_core`.
//!
//! ## Design Principles
//!
//! - Backends expose positioned reads and end-of-store appends, nothing else
//! - No knowledge of journal frames or version records
//! - Must be `Send + Sync` so the engine can share them across threads
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - for tests and ephemeral stores
//! - [`FileBackend`] - for persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use pagedb_storage::{MemoryBackend, StorageBackend};
//!
//! let mut backend = MemoryBackend::new();
//! let offset = backend.append(b"frame bytes").unwrap();
//! assert_eq!(backend.read_at(offset, 11).unwrap(), b"frame bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
