//! Streaming journal reader.

use crate::error::{EngineError, EngineResult};
use crate::journal::record::{
    compute_crc32, JournalRecord, JournalRecordType, JOURNAL_MAGIC, JOURNAL_VERSION,
};
use crate::journal::writer::{CRC_SIZE, HEADER_SIZE};
use pagedb_storage::StorageBackend;
use parking_lot::MutexGuard;

/// Streaming iterator over journal frames.
///
/// Reads one frame at a time so recovery never loads the whole journal
/// into memory. A truncated frame at the end of the file is treated as
/// a torn write from a crash: iteration stops cleanly and
/// [`offset`](Self::offset) reports where the clean prefix ends.
/// Corruption before the tail (bad magic, unsupported version, unknown
/// record type, checksum mismatch) is an error.
pub struct JournalIter<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> JournalIter<'a> {
    pub(crate) fn new(backend: MutexGuard<'a, Box<dyn StorageBackend>>) -> EngineResult<Self> {
        let size = backend.size()?;
        Ok(Self {
            backend,
            size,
            offset: 0,
            finished: false,
        })
    }

    /// Offset of the next unread frame.
    ///
    /// After iteration completes this is the end of the last intact
    /// frame; anything between it and the file size is a torn tail.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total journal size in bytes at the time iteration started.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn read_next(&mut self) -> EngineResult<Option<(u64, JournalRecord)>> {
        if self.finished {
            return Ok(None);
        }

        let remaining = self.size - self.offset;
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            // Torn header from an interrupted append.
            self.finished = true;
            return Ok(None);
        }

        let header = self.backend.read_at(self.offset, HEADER_SIZE)?;
        if header[0..4] != JOURNAL_MAGIC {
            return Err(EngineError::journal_corruption(format!(
                "bad magic at offset {}",
                self.offset
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != JOURNAL_VERSION {
            return Err(EngineError::journal_corruption(format!(
                "unsupported journal version {version} at offset {}",
                self.offset
            )));
        }
        let record_type = JournalRecordType::from_byte(header[6]).ok_or_else(|| {
            EngineError::journal_corruption(format!(
                "unknown record type {} at offset {}",
                header[6], self.offset
            ))
        })?;
        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as u64;

        let frame_len = HEADER_SIZE as u64 + payload_len + CRC_SIZE as u64;
        if remaining < frame_len {
            // Torn payload or checksum; the frame never completed.
            self.finished = true;
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(self.offset + HEADER_SIZE as u64, payload_len as usize + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len as usize);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);
        let computed = compute_crc32(&frame);
        if computed != stored_crc {
            return Err(EngineError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed,
            });
        }

        let record = JournalRecord::decode_payload(record_type, payload)?;
        let record_offset = self.offset;
        self.offset += frame_len;
        Ok(Some((record_offset, record)))
    }
}

impl Iterator for JournalIter<'_> {
    type Item = EngineResult<(u64, JournalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl std::fmt::Debug for JournalIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalIter")
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
