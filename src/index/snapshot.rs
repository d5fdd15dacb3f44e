//! Index snapshots
//!
//! Serialized form of an index's associations, used to persist an index and
//! rebuild it later.
//!
//! ## Snapshot Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                            │
//! │   Magic "HTIX" (4) | Algorithm u8 (1) | KeyKind u8 (1)       │
//! │   PayloadLen u32 (4) | PayloadCRC u32 (4)                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (bincode)                                            │
//! │   table name | attribute name | [(key, position)] key order  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::config::TMP_SUFFIX;
use crate::error::{Result, StoreError};
use crate::heap::Position;

use super::{Algorithm, Index, IndexKey, KeyKind};

/// Magic bytes identifying an index snapshot
pub(crate) const SNAPSHOT_MAGIC: &[u8; 4] = b"HTIX";

/// Header size: Magic (4) + Algorithm (1) + KeyKind (1) + Len (4) + CRC (4)
pub(crate) const SNAPSHOT_HEADER_SIZE: usize = 14;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnapshotBody<K> {
    pub table: String,
    pub attribute: String,
    pub entries: Vec<(K, Position)>,
}

/// Decoded header plus the still-encoded payload
pub(crate) struct RawSnapshot<'a> {
    pub algorithm: Algorithm,
    pub key_kind: KeyKind,
    pub payload: &'a [u8],
}

/// Serialize `index` into a framed snapshot
pub(crate) fn encode<K: IndexKey, I: Index<K>>(algorithm: Algorithm, index: &I) -> Result<Vec<u8>> {
    let body = SnapshotBody {
        table: index.table_name().to_string(),
        attribute: index.attribute_name().to_string(),
        entries: index.entries(),
    };
    let payload = bincode::serialize(&body)?;

    let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + payload.len());
    buf.put_slice(SNAPSHOT_MAGIC);
    buf.put_u8(algorithm as u8);
    buf.put_u8(K::KIND as u8);
    buf.put_u32_le(payload.len() as u32);
    buf.put_u32_le(crc32fast::hash(&payload));
    buf.put_slice(&payload);
    Ok(buf)
}

/// Validate the frame of a snapshot
pub(crate) fn decode(bytes: &[u8]) -> Result<RawSnapshot<'_>> {
    if bytes.len() < SNAPSHOT_HEADER_SIZE {
        return Err(StoreError::Serialization(format!(
            "snapshot header needs {} bytes, got {}",
            SNAPSHOT_HEADER_SIZE,
            bytes.len()
        )));
    }

    let (mut header, payload) = bytes.split_at(SNAPSHOT_HEADER_SIZE);
    if &header[..4] != SNAPSHOT_MAGIC {
        return Err(StoreError::Serialization(format!(
            "invalid snapshot magic: {:?}",
            &header[..4]
        )));
    }
    header.advance(4);

    let algorithm_tag = header.get_u8();
    let algorithm = Algorithm::from_tag(algorithm_tag).ok_or_else(|| {
        StoreError::Serialization(format!("unknown index algorithm 0x{:02x}", algorithm_tag))
    })?;
    let kind_tag = header.get_u8();
    let key_kind = KeyKind::from_tag(kind_tag)
        .ok_or_else(|| StoreError::Serialization(format!("unknown key kind 0x{:02x}", kind_tag)))?;

    let payload_len = header.get_u32_le() as usize;
    let stored_crc = header.get_u32_le();
    if payload.len() != payload_len {
        return Err(StoreError::Serialization(format!(
            "snapshot payload is {} bytes, header says {}",
            payload.len(),
            payload_len
        )));
    }

    let computed_crc = crc32fast::hash(payload);
    if stored_crc != computed_crc {
        return Err(StoreError::Serialization(format!(
            "snapshot checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, computed_crc
        )));
    }

    Ok(RawSnapshot {
        algorithm,
        key_kind,
        payload,
    })
}

/// Rebuild an index of type `I` from a validated payload
pub(crate) fn restore<K: IndexKey, I: Index<K>>(payload: &[u8]) -> Result<I> {
    let body: SnapshotBody<K> = bincode::deserialize(payload)?;

    let mut index = I::new(&body.table, &body.attribute);
    let (_, accepted) = index.bulk_insert(body.entries);
    if accepted.contains(&false) {
        return Err(StoreError::Serialization(format!(
            "snapshot of {}.{} holds entries the index rejects",
            body.table, body.attribute
        )));
    }
    Ok(index)
}

/// Write `bytes` to `path` through a temporary sibling
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(TMP_SUFFIX);
    let tmp_path = PathBuf::from(tmp_path);
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
