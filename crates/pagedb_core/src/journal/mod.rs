//! Commit journal for durability and crash recovery.
//!
//! Every transaction writes its full frame sequence to the journal before
//! any version record reaches the record store. On crash, the journal is
//! replayed to re-apply committed transactions whose records never made
//! it to disk.
//!
//! ## Journal Frame Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! A commit appends `Begin`, one `Version` frame per version record, and a
//! closing `Commit`, all under the store's mutation lock, so frames from
//! different transactions never interleave. Rollback writes nothing; there
//! is no abort frame.
//!
//! ## Streaming Replay
//!
//! Replay iterates one frame at a time instead of loading the journal:
//!
//! ```ignore
//! for result in journal.iter()? {
//!     let (offset, record) = result?;
//!     // Handle the record without buffering the whole journal
//! }
//! ```
//!
//! ## Recovery Policy
//!
//! The iterator distinguishes **tolerated** and **fatal** conditions:
//!
//! ### Tolerated (treat as clean end of journal)
//!
//! - **Truncated header**: fewer than 11 bytes remain → iteration ends
//! - **Truncated payload**: frame length exceeds remaining bytes → iteration ends
//!
//! Both mean the process died mid-append. The torn frame belongs to a
//! transaction whose `Commit` never hit disk, so dropping it rolls that
//! transaction back.
//!
//! ### Fatal (refuse to open the store)
//!
//! - **CRC mismatch** → `Err(ChecksumMismatch)`
//! - **Bad magic bytes** → `Err(JournalCorruption)`
//! - **Unknown record type** → `Err(JournalCorruption)`
//! - **Unsupported format version** → `Err(JournalCorruption)`
//!
//! These appear before the tail only when the file was actually damaged,
//! and opening anyway would lose acknowledged commits silently.
//!
//! ## Invariants
//!
//! - The journal is append-only between checkpoints
//! - The journal is flushed before the record store is written
//! - Recovery replays only transactions with a `Commit` frame
//! - Replay is idempotent: versions already in the record store are skipped

mod iterator;
mod record;
mod writer;

pub use iterator::JournalIter;
pub use record::{compute_crc32, JournalRecord, JournalRecordType};
pub use writer::Journal;
