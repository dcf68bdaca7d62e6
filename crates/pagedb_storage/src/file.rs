//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A storage backend persisting to a single file.
///
/// The file handle and the cached size live behind one mutex so a reader
/// can never observe a size the file has not caught up to.
///
/// # Durability
///
/// - `flush()` maps to [`File::flush`]
/// - `sync()` maps to [`File::sync_all`]
///
/// # Example
///
/// ```no_run
/// use pagedb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("pages.dat")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens the file at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { file, size }),
        })
    }

    /// Like [`open`](Self::open), but creates missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let end = offset.saturating_add(len as u64);

        if offset > inner.size || end > inner.size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: inner.size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        inner.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        if data.is_empty() {
            return Ok(inner.size);
        }

        let offset = inner.size;
        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(data)?;
        inner.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.lock().file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if new_size > inner.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: inner.size,
            });
        }

        inner.file.set_len(new_size)?;
        inner.file.sync_all()?;
        inner.size = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn append_then_read() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.bin")).unwrap();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.bin")).unwrap();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(4, 4),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"durable bytes").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 13);
        assert_eq!(backend.read_at(0, 13).unwrap(), b"durable bytes");
    }

    #[test]
    fn open_with_create_dirs_builds_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("store.bin");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn truncate_discards_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"keep-drop").unwrap();
        backend.truncate(4).unwrap();

        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.read_at(0, 4).unwrap(), b"keep");

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.size().unwrap(), 4);
    }
}
