//! Store directory management.
//!
//! File system layout for a page store:
//!
//! ```text
//! <store>/
//! ├─ MANIFEST       # Format metadata and last checkpoint
//! ├─ LOCK           # Advisory lock for single-process access
//! ├─ journal.log    # Commit journal
//! └─ pages.dat      # Version record store
//! ```
//!
//! The LOCK file ensures only one process opens the store at a time. The
//! MANIFEST persists the format version across restarts.

use crate::error::{EngineError, EngineResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";
const RECORDS_FILE: &str = "pages.dat";

/// Manages the store directory and its advisory lock.
///
/// Holds an exclusive lock on the directory for its entire lifetime, so
/// only one `StoreDir` can exist per directory at a time; the lock is
/// released when the value drops.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    /// Held for exclusive access, released on drop.
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`InvalidFormat`](EngineError::InvalidFormat) if the directory is
    ///   missing and `create_if_missing` is false, or the path is not a
    ///   directory
    /// - [`StoreLocked`](EngineError::StoreLocked) if another process
    ///   holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(EngineError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(EngineError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// The store directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the commit journal.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    /// Path of the version record store.
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.path.join(RECORDS_FILE)
    }

    /// Path of the MANIFEST file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// True for a directory with no store files yet.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.manifest_path().exists() && !self.journal_path().exists()
    }

    /// Loads the manifest, `None` if none was written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load_manifest(&self) -> EngineResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }

        let mut data = Vec::new();
        File::open(&manifest_path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(Manifest::decode(&data)?))
    }

    /// Saves the manifest atomically.
    ///
    /// Write-then-rename for crash safety: write a temp file, sync it,
    /// rename over MANIFEST, then fsync the directory so the rename is
    /// durable.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the write fails.
    pub fn save_manifest(&self, manifest: &Manifest) -> EngineResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(&manifest.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        self.sync_directory()?;
        Ok(())
    }

    /// Fsyncs the directory so file creations and renames are durable.
    #[cfg(unix)]
    fn sync_directory(&self) -> EngineResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    /// NTFS journaling covers metadata durability; no directory fsync.
    #[cfg(not(unix))]
    fn sync_directory(&self) -> EngineResult<()> {
        Ok(())
    }
}
