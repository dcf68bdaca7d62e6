//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A storage backend holding all data in a heap buffer.
///
/// Suitable for unit tests and for ephemeral stores that never need to
/// survive the process. Thread-safe.
///
/// # Example
///
/// ```rust
/// use pagedb_storage::{MemoryBackend, StorageBackend};
///
/// let mut backend = MemoryBackend::new();
/// backend.append(b"abc").unwrap();
/// assert_eq!(backend.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buf: RwLock<Vec<u8>>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    ///
    /// Used by recovery tests to replay hand-built file images.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            buf: RwLock::new(data),
        }
    }

    /// Returns a copy of the full contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buf.read().clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let buf = self.buf.read();
        let size = buf.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > buf.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(buf[start..end].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut buf = self.buf.write();
        let offset = buf.len() as u64;
        buf.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.buf.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut buf = self.buf.write();
        let size = buf.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        buf.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_previous_size() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn read_at_returns_written_bytes() {
        let mut backend = MemoryBackend::new();
        backend.append(b"hello world").unwrap();
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
        assert!(backend.read_at(2, 0).unwrap().is_empty());
    }

    #[test]
    fn read_past_end_is_rejected() {
        let mut backend = MemoryBackend::new();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(10, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn preloaded_data_readable() {
        let backend = MemoryBackend::with_data(b"seeded".to_vec());
        assert_eq!(backend.read_at(0, 6).unwrap(), b"seeded");
    }

    #[test]
    fn truncate_shrinks_only() {
        let mut backend = MemoryBackend::new();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.contents(), b"hello");

        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }
}
