//! File header shared by every file of a family.
//!
//! Fixed 64-byte layout, little endian:
//!
//! ```text
//! 0..4    magic "AEAT"
//! 4       file kind
//! 5       basic type code
//! 6       collection type code
//! 7       enumerated flag
//! 8..12   format version
//! 12..20  create serial number
//! 20..24  doc id limit
//! 24..40  save id (uuid)
//! 40..48  saved at, unix millis
//! 48..56  payload length
//! 56..60  payload crc32
//! 60..64  header crc32 over bytes 0..60
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::attribute::{AttributeConfig, AttributeError, AttributeResult, BasicType, CollectionType};

pub const MAGIC: [u8; 4] = *b"AEAT";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 64;

/// The four files of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Dat,
    Idx,
    Weight,
    Udat,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [FileKind::Dat, FileKind::Idx, FileKind::Weight, FileKind::Udat];

    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::Dat => "dat",
            FileKind::Idx => "idx",
            FileKind::Weight => "weight",
            FileKind::Udat => "udat",
        }
    }

    fn code(self) -> u8 {
        match self {
            FileKind::Dat => 1,
            FileKind::Idx => 2,
            FileKind::Weight => 3,
            FileKind::Udat => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FileKind::Dat),
            2 => Some(FileKind::Idx),
            3 => Some(FileKind::Weight),
            4 => Some(FileKind::Udat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub kind: FileKind,
    pub basic_type: BasicType,
    pub collection_type: CollectionType,
    pub enumerated: bool,
    pub version: u32,
    pub create_serial_num: u64,
    pub doc_id_limit: u32,
    pub save_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub payload_len: u64,
    pub payload_crc: u32,
}

impl FileHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.kind.code();
        out[5] = self.basic_type.code();
        out[6] = self.collection_type.code();
        out[7] = self.enumerated as u8;
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..20].copy_from_slice(&self.create_serial_num.to_le_bytes());
        out[20..24].copy_from_slice(&self.doc_id_limit.to_le_bytes());
        out[24..40].copy_from_slice(self.save_id.as_bytes());
        out[40..48].copy_from_slice(&self.saved_at.timestamp_millis().to_le_bytes());
        out[48..56].copy_from_slice(&self.payload_len.to_le_bytes());
        out[56..60].copy_from_slice(&self.payload_crc.to_le_bytes());
        let crc = crc32fast::hash(&out[0..60]);
        out[60..64].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parse and verify a whole file, returning its header and payload.
    ///
    /// Checks magic, header checksum, version, payload length and payload
    /// checksum. `file` names the file in errors.
    pub fn decode<'a>(file: &str, bytes: &'a [u8]) -> AttributeResult<(FileHeader, &'a [u8])> {
        if bytes.len() < HEADER_LEN {
            return Err(AttributeError::corrupt(file, "shorter than header"));
        }
        let (head, payload) = bytes.split_at(HEADER_LEN);
        if head[0..4] != MAGIC {
            return Err(AttributeError::corrupt(file, "bad magic"));
        }
        if crc32fast::hash(&head[0..60]) != le_u32(&head[60..64]) {
            return Err(AttributeError::corrupt(file, "header checksum mismatch"));
        }

        let kind = FileKind::from_code(head[4])
            .ok_or_else(|| AttributeError::corrupt(file, format!("unknown file kind {}", head[4])))?;
        let basic_type = BasicType::from_code(head[5]).ok_or_else(|| {
            AttributeError::corrupt(file, format!("unknown basic type {}", head[5]))
        })?;
        let collection_type = CollectionType::from_code(head[6]).ok_or_else(|| {
            AttributeError::corrupt(file, format!("unknown collection type {}", head[6]))
        })?;
        let enumerated = match head[7] {
            0 => false,
            1 => true,
            other => {
                return Err(AttributeError::corrupt(
                    file,
                    format!("bad enumerated flag {}", other),
                ))
            }
        };
        let version = le_u32(&head[8..12]);
        if version != FORMAT_VERSION {
            return Err(AttributeError::corrupt(
                file,
                format!("unsupported format version {}", version),
            ));
        }
        let mut save_id = [0u8; 16];
        save_id.copy_from_slice(&head[24..40]);
        let millis = i64::from_le_bytes(le_array(&head[40..48]));
        let saved_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| AttributeError::corrupt(file, "bad timestamp"))?;

        let header = FileHeader {
            kind,
            basic_type,
            collection_type,
            enumerated,
            version,
            create_serial_num: u64::from_le_bytes(le_array(&head[12..20])),
            doc_id_limit: le_u32(&head[20..24]),
            save_id: Uuid::from_bytes(save_id),
            saved_at,
            payload_len: u64::from_le_bytes(le_array(&head[48..56])),
            payload_crc: le_u32(&head[56..60]),
        };

        if header.payload_len != payload.len() as u64 {
            return Err(AttributeError::corrupt(
                file,
                format!(
                    "payload is {} bytes, header says {}",
                    payload.len(),
                    header.payload_len
                ),
            ));
        }
        if crc32fast::hash(payload) != header.payload_crc {
            return Err(AttributeError::corrupt(file, "payload checksum mismatch"));
        }
        Ok((header, payload))
    }

    /// Fail with `ConfigMismatch` unless the header matches `config`.
    pub fn check_config(&self, config: &AttributeConfig, file: &str) -> AttributeResult<()> {
        if self.basic_type != config.basic_type {
            return Err(AttributeError::mismatch(
                file,
                "basic_type",
                config.basic_type,
                self.basic_type,
            ));
        }
        if self.collection_type != config.collection_type {
            return Err(AttributeError::mismatch(
                file,
                "collection_type",
                config.collection_type,
                self.collection_type,
            ));
        }
        Ok(())
    }

    /// Fail with `CorruptFile` unless `other` belongs to the same save.
    pub fn check_same_family(&self, other: &FileHeader, file: &str) -> AttributeResult<()> {
        if other.save_id != self.save_id {
            return Err(AttributeError::corrupt(file, "save id differs from dat file"));
        }
        if other.basic_type != self.basic_type
            || other.collection_type != self.collection_type
            || other.enumerated != self.enumerated
            || other.doc_id_limit != self.doc_id_limit
            || other.create_serial_num != self.create_serial_num
        {
            return Err(AttributeError::corrupt(file, "header differs from dat file"));
        }
        Ok(())
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(le_array(bytes))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
