//! Store manifest for format metadata.

use crate::error::{EngineError, EngineResult};
use crate::types::VersionId;

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"PGMF";

/// Current manifest encoding version.
pub const MANIFEST_VERSION: u16 = 1;

/// Store metadata persisted atomically alongside the data files.
///
/// Holds the format version (so future readers can refuse stores they
/// don't understand) and the id of the last checkpointed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Store format version (major, minor).
    pub format_version: (u16, u16),
    /// Newest version id covered by the last checkpoint.
    pub last_checkpoint: Option<VersionId>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new((1, 0))
    }
}

impl Manifest {
    /// Creates a manifest for a fresh store.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            last_checkpoint: None,
        }
    }

    /// Encodes the manifest to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(19);
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.format_version.0.to_le_bytes());
        buf.extend_from_slice(&self.format_version.1.to_le_bytes());
        match self.last_checkpoint {
            Some(id) => {
                buf.push(1);
                buf.extend_from_slice(&id.as_u64().to_le_bytes());
            }
            None => buf.push(0),
        }
        buf
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFormat`](EngineError::InvalidFormat) on bad magic,
    /// an unsupported encoding version, or a truncated buffer.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        if data.len() < 4 || data[0..4] != MANIFEST_MAGIC {
            return Err(EngineError::invalid_format("invalid manifest magic"));
        }
        let mut cursor = 4;

        let version = read_u16(data, &mut cursor)?;
        if version > MANIFEST_VERSION {
            return Err(EngineError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }

        let format_major = read_u16(data, &mut cursor)?;
        let format_minor = read_u16(data, &mut cursor)?;

        let last_checkpoint = match data.get(cursor) {
            Some(0) => None,
            Some(1) => {
                cursor += 1;
                if cursor + 8 > data.len() {
                    return Err(EngineError::invalid_format("manifest too short"));
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&data[cursor..cursor + 8]);
                Some(VersionId::new(u64::from_le_bytes(raw)))
            }
            _ => return Err(EngineError::invalid_format("invalid checkpoint marker")),
        };

        Ok(Self {
            format_version: (format_major, format_minor),
            last_checkpoint,
        })
    }
}

fn read_u16(data: &[u8], cursor: &mut usize) -> EngineResult<u16> {
    if *cursor + 2 > data.len() {
        return Err(EngineError::invalid_format("manifest too short"));
    }
    let value = u16::from_le_bytes([data[*cursor], data[*cursor + 1]]);
    *cursor += 2;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut manifest = Manifest::new((1, 2));
        manifest.last_checkpoint = Some(VersionId::new(42));

        let decoded = Manifest::decode(&manifest.encode()).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn fresh_manifest_has_no_checkpoint() {
        let decoded = Manifest::decode(&Manifest::default().encode()).unwrap();
        assert_eq!(decoded.last_checkpoint, None);
        assert_eq!(decoded.format_version, (1, 0));
    }

    #[test]
    fn invalid_magic_rejected() {
        assert!(Manifest::decode(b"XXXX").is_err());
        assert!(Manifest::decode(b"PG").is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut encoded = Manifest::default().encode();
        encoded[4] = 0xFF;
        encoded[5] = 0xFF;
        assert!(matches!(
            Manifest::decode(&encoded),
            Err(EngineError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn truncated_manifest_rejected() {
        let encoded = Manifest::default().encode();
        assert!(Manifest::decode(&encoded[..encoded.len() - 1]).is_err());
    }
}
