//! Journal writer.

use crate::error::{EngineError, EngineResult};
use crate::journal::iterator::JournalIter;
use crate::journal::record::{compute_crc32, JournalRecord, JOURNAL_MAGIC, JOURNAL_VERSION};
use pagedb_storage::StorageBackend;
use parking_lot::Mutex;

/// Envelope header size.
/// magic (4) + version (2) + type (1) + length (4) = 11 bytes
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub(crate) const CRC_SIZE: usize = 4;

/// Append-only commit journal.
///
/// All frames for a commit are appended and flushed before the record
/// store is touched, so a frame sequence missing its `Commit` marker is
/// dropped at recovery instead of surfacing a half-applied transaction.
pub struct Journal {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl Journal {
    /// Creates a journal over a storage backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Appends one framed record, returning its offset.
    ///
    /// The caller decides when to [`flush`](Self::flush) or
    /// [`sync`](Self::sync); a commit appends all its frames first and
    /// makes them durable in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the backend write fails.
    pub fn append(&self, record: &JournalRecord) -> EngineResult<u64> {
        let payload = record.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::invalid_operation("journal record payload too large"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&JOURNAL_MAGIC);
        frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        frame.push(record.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let mut backend = self.backend.lock();
        Ok(backend.append(&frame)?)
    }

    /// Pushes buffered frames to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> EngineResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Forces frames to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> EngineResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Current journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn size(&self) -> EngineResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Streaming iterator over journal records.
    ///
    /// Holds the journal lock for the iterator's lifetime; recovery runs
    /// before the store accepts transactions, so nothing competes for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn iter(&self) -> EngineResult<JournalIter<'_>> {
        JournalIter::new(self.backend.lock())
    }

    /// Reads all records into memory. Intended for tools and tests.
    ///
    /// # Errors
    ///
    /// Returns the first corruption or I/O error encountered.
    pub fn read_all(&self) -> EngineResult<Vec<(u64, JournalRecord)>> {
        self.iter()?.collect()
    }

    /// Discards everything after `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    pub fn truncate(&self, offset: u64) -> EngineResult<()> {
        self.backend.lock().truncate(offset)?;
        Ok(())
    }

    /// Drops all journal contents. Used at checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    pub fn clear(&self) -> EngineResult<()> {
        self.truncate(0)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").finish_non_exhaustive()
    }
}
