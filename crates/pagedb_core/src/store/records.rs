//! On-disk version record frames and the append-only record store.

use crate::error::{EngineError, EngineResult};
use crate::journal::compute_crc32;
use crate::path::PagePath;
use crate::types::VersionId;
use crate::version::VersionRecord;
use pagedb_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Flags carried by a stored record frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(u8);

impl RecordFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Record ends the page's life at its path (delete or move-away).
    pub const TOMBSTONE: Self = Self(0x01);

    /// Creates flags from a raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Checks whether the tombstone flag is set.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Sets the tombstone flag.
    #[must_use]
    pub const fn with_tombstone(self) -> Self {
        Self(self.0 | 0x01)
    }
}

/// A framed version record as it appears in the record file.
///
/// The frame repeats the version id, path, and tombstone flag outside
/// the encoded payload so index rebuilds can scan the file without
/// decoding every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Version id this frame carries.
    pub version_id: VersionId,
    /// Path the version was committed under.
    pub path: PagePath,
    /// Frame flags.
    pub flags: RecordFlags,
    /// Encoded [`VersionRecord`] payload.
    pub payload: Vec<u8>,
}

impl StoredRecord {
    /// Fixed header size: record_len (4) + version_id (8) + path_len (2) = 14.
    /// The path and a one-byte flags field follow before the payload.
    const FIXED_HEADER_SIZE: usize = 14;
    /// CRC size.
    const CRC_SIZE: usize = 4;
    /// Smallest legal frame: empty path, empty payload.
    const MIN_SIZE: usize = Self::FIXED_HEADER_SIZE + 1 + Self::CRC_SIZE;

    /// Builds a frame from a version record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or its path is
    /// too long to frame.
    pub fn from_version(version: &VersionRecord) -> EngineResult<Self> {
        if u16::try_from(version.path.as_str().len()).is_err() {
            return Err(EngineError::invalid_operation("page path too long"));
        }
        let flags = if version.is_tombstone() {
            RecordFlags::NONE.with_tombstone()
        } else {
            RecordFlags::NONE
        };
        Ok(Self {
            version_id: version.id,
            path: version.path.clone(),
            flags,
            payload: version.encode()?,
        })
    }

    /// Decodes the payload back into a version record.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid version record.
    pub fn to_version(&self) -> EngineResult<VersionRecord> {
        VersionRecord::decode(&self.payload)
    }

    /// Returns whether the tombstone flag is set.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.flags.is_tombstone()
    }

    /// Encodes the frame to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let path_bytes = self.path.as_str().as_bytes();
        let record_len = self.encoded_size();
        let mut buf = Vec::with_capacity(record_len);

        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.version_id.as_u64().to_le_bytes());
        buf.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(path_bytes);
        buf.push(self.flags.as_byte());
        buf.extend_from_slice(&self.payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Decodes a frame from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation, a malformed header, or a
    /// checksum mismatch.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(EngineError::record_corruption("record frame too short"));
        }

        let record_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_len < Self::MIN_SIZE {
            return Err(EngineError::record_corruption("record length below minimum"));
        }
        if data.len() < record_len {
            return Err(EngineError::record_corruption("incomplete record frame"));
        }

        let stored_crc = u32::from_le_bytes([
            data[record_len - 4],
            data[record_len - 3],
            data[record_len - 2],
            data[record_len - 1],
        ]);
        let computed_crc = compute_crc32(&data[..record_len - 4]);
        if stored_crc != computed_crc {
            return Err(EngineError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let version_id = VersionId::new(u64::from_le_bytes([
            data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
        ]));
        let path_len = u16::from_le_bytes([data[12], data[13]]) as usize;

        let flags_at = Self::FIXED_HEADER_SIZE + path_len;
        if flags_at + 1 + Self::CRC_SIZE > record_len {
            return Err(EngineError::record_corruption("path overruns record frame"));
        }

        let path_str = std::str::from_utf8(&data[Self::FIXED_HEADER_SIZE..flags_at])
            .map_err(|_| EngineError::record_corruption("record path is not UTF-8"))?;
        let path = PagePath::new(path_str);
        let flags = RecordFlags::from_byte(data[flags_at]);
        let payload = data[flags_at + 1..record_len - Self::CRC_SIZE].to_vec();

        Ok(Self {
            version_id,
            path,
            flags,
            payload,
        })
    }

    /// Returns the encoded size of this frame.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::FIXED_HEADER_SIZE + self.path.as_str().len() + 1 + self.payload.len() + Self::CRC_SIZE
    }
}

/// Summary of a record file scan, used to seed in-memory state on open.
#[derive(Debug, Default)]
pub struct RecordScan {
    /// Number of frames in the file.
    pub record_count: usize,
    /// Highest version id seen.
    pub max_version: Option<VersionId>,
    /// Latest frame per path, with its tombstone flag.
    pub latest: HashMap<PagePath, (VersionId, bool)>,
}

/// Append-only store for version record frames.
///
/// Frames are never rewritten. An in-memory map from version id to file
/// offset serves point lookups; it is rebuilt by [`rebuild`](Self::rebuild)
/// when a store opens.
pub struct RecordStore {
    backend: RwLock<Box<dyn StorageBackend>>,
    index: RwLock<HashMap<VersionId, u64>>,
}

impl RecordStore {
    /// Creates a record store over a storage backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: RwLock::new(backend),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Appends a frame, returning the offset where it was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn append(&self, record: &StoredRecord) -> EngineResult<u64> {
        self.append_raw(&record.encode(), record.version_id)
    }

    /// Appends pre-encoded frame bytes.
    ///
    /// The caller supplies the frame's version id so the offset index
    /// can be updated without re-decoding; commit and journal replay
    /// both hold a decoded copy already.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn append_raw(&self, frame: &[u8], version_id: VersionId) -> EngineResult<u64> {
        let mut backend = self.backend.write();
        let offset = backend.append(frame)?;
        self.index.write().insert(version_id, offset);
        Ok(offset)
    }

    /// Fetches a version record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored frame is corrupt or unreadable.
    pub fn get(&self, id: VersionId) -> EngineResult<Option<VersionRecord>> {
        let offset = {
            let index = self.index.read();
            match index.get(&id) {
                Some(&offset) => offset,
                None => return Ok(None),
            }
        };

        let frame = self.read_at(offset)?;
        if frame.version_id != id {
            return Err(EngineError::record_corruption(format!(
                "frame at offset {offset} holds {} but was indexed as {id}",
                frame.version_id
            )));
        }
        Ok(Some(frame.to_version()?))
    }

    /// Checks whether a version id is present.
    pub fn contains(&self, id: VersionId) -> bool {
        self.index.read().contains_key(&id)
    }

    /// Reads the frame at a specific offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset does not hold an intact frame.
    pub fn read_at(&self, offset: u64) -> EngineResult<StoredRecord> {
        let backend = self.backend.read();
        let size = backend.size()?;

        if offset + 4 > size {
            return Err(EngineError::record_corruption("offset beyond record file"));
        }
        let len_bytes = backend.read_at(offset, 4)?;
        let record_len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as u64;
        if record_len < StoredRecord::MIN_SIZE as u64 || offset + record_len > size {
            return Err(EngineError::record_corruption(
                "record extends beyond record file",
            ));
        }

        let data = backend.read_at(offset, record_len as usize)?;
        StoredRecord::decode(&data)
    }

    /// Scans the whole file, rebuilding the offset index and returning
    /// what the caller needs to seed path state and id counters.
    ///
    /// Unlike the journal, a short frame at the end of this file is not
    /// tolerated: every frame was journaled before it was appended, so
    /// a torn frame means the file itself is damaged.
    ///
    /// # Errors
    ///
    /// Returns an error on any torn or corrupt frame.
    pub fn rebuild(&self) -> EngineResult<RecordScan> {
        let backend = self.backend.read();
        let size = backend.size()?;

        let mut index = HashMap::new();
        let mut scan = RecordScan::default();
        let mut offset = 0u64;

        while offset < size {
            if offset + 4 > size {
                return Err(EngineError::record_corruption(
                    "torn frame header at end of record file",
                ));
            }
            let len_bytes = backend.read_at(offset, 4)?;
            let record_len =
                u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as u64;
            if record_len < StoredRecord::MIN_SIZE as u64 {
                return Err(EngineError::record_corruption("record length below minimum"));
            }
            if offset + record_len > size {
                return Err(EngineError::record_corruption(
                    "torn frame at end of record file",
                ));
            }

            let data = backend.read_at(offset, record_len as usize)?;
            let frame = StoredRecord::decode(&data)?;

            index.insert(frame.version_id, offset);
            scan.record_count += 1;
            scan.max_version = Some(match scan.max_version {
                Some(max) if max >= frame.version_id => max,
                _ => frame.version_id,
            });
            scan.latest
                .insert(frame.path, (frame.version_id, frame.flags.is_tombstone()));

            offset += record_len;
        }

        *self.index.write() = index;
        Ok(scan)
    }

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> EngineResult<()> {
        self.backend.write().flush()?;
        Ok(())
    }

    /// Forces writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> EngineResult<()> {
        self.backend.write().sync()?;
        Ok(())
    }

    /// Current record file size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn size(&self) -> EngineResult<u64> {
        Ok(self.backend.read().size()?)
    }

    /// Number of indexed version records.
    pub fn record_count(&self) -> usize {
        self.index.read().len()
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("record_count", &self.record_count())
            .finish_non_exhaustive()
    }
}
