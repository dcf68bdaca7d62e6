//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level append-only byte store.
///
/// Backends are opaque: they hold bytes written by the engine and return
/// them unchanged. The engine owns all framing and checksum interpretation,
/// so a backend never understands journal records or version frames.
///
/// # Invariants
///
/// - `append` returns the offset the data landed at, which equals the size
///   of the store before the call
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` returns, appended data survives process termination
/// - `truncate` only shrinks; growing is an error
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadPastEnd`](crate::StorageError::ReadPastEnd) if the
    /// range extends beyond the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` to the end of the store, returning its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable storage.
    ///
    /// Stronger than [`flush`](Self::flush): after this returns, the store
    /// contents survive power loss, not just process exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the store in bytes.
    ///
    /// This is the offset the next `append` will write at.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Shrinks the store to `new_size` bytes, discarding everything after.
    ///
    /// Used for journal truncation after a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// if `new_size` exceeds the current size, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
