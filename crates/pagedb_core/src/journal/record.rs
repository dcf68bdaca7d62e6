//! Journal record types and serialization.

use crate::error::{EngineError, EngineResult};
use crate::types::{TransactionId, VersionId};

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"PGWL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// Begin a transaction.
    Begin = 1,
    /// One committed page version, body as stored in the record store.
    Version = 2,
    /// Commit marker; everything since Begin becomes durable.
    Commit = 3,
    /// Checkpoint marker left after truncation.
    Checkpoint = 4,
}

impl JournalRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Version),
            3 => Some(Self::Commit),
            4 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A journal record.
///
/// A commit appends `Begin`, one `Version` per staged page, then `Commit`,
/// all before the record store is touched. Rollback writes nothing, so no
/// abort marker exists; a transaction without its `Commit` is dropped at
/// recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Begin a transaction.
    Begin {
        /// Transaction ID.
        txn: TransactionId,
    },

    /// One new page version.
    Version {
        /// Transaction ID.
        txn: TransactionId,
        /// Encoded version record body (CBOR, as persisted to the store).
        body: Vec<u8>,
    },

    /// Commit marker.
    Commit {
        /// Transaction ID.
        txn: TransactionId,
    },

    /// Checkpoint marker.
    Checkpoint {
        /// Newest version id covered by the checkpoint.
        last_version: Option<VersionId>,
    },
}

impl JournalRecord {
    /// Maximum body size in a `Version` record.
    ///
    /// The envelope length field is 4 bytes, so larger bodies cannot be
    /// framed.
    pub const MAX_BODY_SIZE: usize = u32::MAX as usize - 16;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> JournalRecordType {
        match self {
            Self::Begin { .. } => JournalRecordType::Begin,
            Self::Version { .. } => JournalRecordType::Version,
            Self::Commit { .. } => JournalRecordType::Commit,
            Self::Checkpoint { .. } => JournalRecordType::Checkpoint,
        }
    }

    /// Returns the transaction ID if this record carries one.
    #[must_use]
    pub fn txn(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { txn } | Self::Version { txn, .. } | Self::Commit { txn } => Some(*txn),
            Self::Checkpoint { .. } => None,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a `Version` body exceeds
    /// [`MAX_BODY_SIZE`](Self::MAX_BODY_SIZE).
    pub fn encode_payload(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Begin { txn } | Self::Commit { txn } => {
                buf.extend_from_slice(&txn.as_u64().to_le_bytes());
            }

            Self::Version { txn, body } => {
                if body.len() > Self::MAX_BODY_SIZE {
                    return Err(EngineError::invalid_operation(format!(
                        "version body too large for journal: {} bytes",
                        body.len()
                    )));
                }
                buf.extend_from_slice(&txn.as_u64().to_le_bytes());
                buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
                buf.extend_from_slice(body);
            }

            Self::Checkpoint { last_version } => match last_version {
                Some(id) => {
                    buf.push(1);
                    buf.extend_from_slice(&id.as_u64().to_le_bytes());
                }
                None => buf.push(0),
            },
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`JournalCorruption`](EngineError::JournalCorruption) on a
    /// short payload or trailing bytes.
    pub fn decode_payload(record_type: JournalRecordType, payload: &[u8]) -> EngineResult<Self> {
        let mut cursor = 0;

        let record = match record_type {
            JournalRecordType::Begin => Self::Begin {
                txn: TransactionId::new(read_u64(payload, &mut cursor)?),
            },

            JournalRecordType::Version => {
                let txn = TransactionId::new(read_u64(payload, &mut cursor)?);
                let len = read_u32(payload, &mut cursor)? as usize;
                if cursor + len > payload.len() {
                    return Err(EngineError::journal_corruption(
                        "version body extends past payload",
                    ));
                }
                let body = payload[cursor..cursor + len].to_vec();
                cursor += len;
                Self::Version { txn, body }
            }

            JournalRecordType::Commit => Self::Commit {
                txn: TransactionId::new(read_u64(payload, &mut cursor)?),
            },

            JournalRecordType::Checkpoint => {
                let last_version = match payload.first() {
                    Some(0) => {
                        cursor += 1;
                        None
                    }
                    Some(1) => {
                        cursor += 1;
                        Some(VersionId::new(read_u64(payload, &mut cursor)?))
                    }
                    _ => {
                        return Err(EngineError::journal_corruption(
                            "invalid checkpoint marker byte",
                        ))
                    }
                };
                Self::Checkpoint { last_version }
            }
        };

        if cursor != payload.len() {
            return Err(EngineError::journal_corruption(format!(
                "trailing bytes in {record_type:?} record: payload {} bytes, consumed {cursor}",
                payload.len()
            )));
        }

        Ok(record)
    }
}

fn read_u64(payload: &[u8], cursor: &mut usize) -> EngineResult<u64> {
    if *cursor + 8 > payload.len() {
        return Err(EngineError::journal_corruption("unexpected end of payload"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&payload[*cursor..*cursor + 8]);
    *cursor += 8;
    Ok(u64::from_le_bytes(raw))
}

fn read_u32(payload: &[u8], cursor: &mut usize) -> EngineResult<u32> {
    if *cursor + 4 > payload.len() {
        return Err(EngineError::journal_corruption("unexpected end of payload"));
    }
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&payload[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(u32::from_le_bytes(raw))
}

/// Computes the CRC-32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_round_trip() {
        for t in [
            JournalRecordType::Begin,
            JournalRecordType::Version,
            JournalRecordType::Commit,
            JournalRecordType::Checkpoint,
        ] {
            assert_eq!(JournalRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(JournalRecordType::from_byte(0), None);
        assert_eq!(JournalRecordType::from_byte(200), None);
    }

    #[test]
    fn version_record_round_trip() {
        let record = JournalRecord::Version {
            txn: TransactionId::new(3),
            body: vec![0xCA, 0xFE, 0xBA, 0xBE],
        };
        let payload = record.encode_payload().unwrap();
        let decoded =
            JournalRecord::decode_payload(JournalRecordType::Version, &payload).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn checkpoint_with_and_without_version() {
        for last_version in [None, Some(VersionId::new(88))] {
            let record = JournalRecord::Checkpoint { last_version };
            let payload = record.encode_payload().unwrap();
            let decoded =
                JournalRecord::decode_payload(JournalRecordType::Checkpoint, &payload).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut payload = JournalRecord::Begin {
            txn: TransactionId::new(1),
        }
        .encode_payload()
        .unwrap();
        payload.push(0xAA);

        assert!(matches!(
            JournalRecord::decode_payload(JournalRecordType::Begin, &payload),
            Err(EngineError::JournalCorruption { .. })
        ));
    }

    #[test]
    fn short_payload_rejected() {
        assert!(JournalRecord::decode_payload(JournalRecordType::Commit, &[1, 2]).is_err());
        assert!(JournalRecord::decode_payload(JournalRecordType::Version, &[]).is_err());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }
}
