//! Table metadata block
//!
//! The schema header of a table, persisted as one fixed-size block.
//!
//! ## Block Format (2261 bytes, little-endian)
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                              │
//! │   Magic "HTMD" (4) | Version u16 (2) | AttrCount u16 (2)       │
//! │   FirstDeleted i64 (8)                                         │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Primary Key (65 bytes)                                         │
//! │   NameLen u8 (1) | Name (64, zero-padded)                      │
//! ├────────────────────────────────────────────────────────────────┤
//! │ Attribute Slots (32 x 68 bytes, unused slots zeroed)           │
//! │   Kind u8 (1) | Size u16 (2) | NameLen u8 (1) | Name (64)      │
//! ├────────────────────────────────────────────────────────────────┤
//! │ CRC32 of everything above (4)                                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use bytes::{Buf, BufMut};

use crate::config::is_path_component;
use crate::error::{Result, StoreError};
use crate::types::{TypeDescriptor, TypeKind};

use super::{decode_position, encode_position, Position, FREE_POINTER_SIZE};

/// Magic bytes identifying a metadata block
pub const METADATA_MAGIC: &[u8; 4] = b"HTMD";

/// Current metadata format version
pub const METADATA_VERSION: u16 = 1;

/// Maximum number of attributes per table
pub const MAX_ATTRIBUTES: usize = 32;

/// Maximum byte length of an attribute or primary key name
pub const MAX_NAME_LEN: usize = 64;

const HEADER_SIZE: usize = 4 + 2 + 2 + 8;
const NAME_FIELD_SIZE: usize = 1 + MAX_NAME_LEN;
const ATTRIBUTE_SLOT_SIZE: usize = 1 + 2 + NAME_FIELD_SIZE;
const CRC_SIZE: usize = 4;

/// Exact byte size of a persisted metadata block
pub const METADATA_SIZE: usize =
    HEADER_SIZE + NAME_FIELD_SIZE + MAX_ATTRIBUTES * ATTRIBUTE_SLOT_SIZE + CRC_SIZE;

/// Schema header of a table
///
/// `attribute_names` and `attribute_types` are index-aligned and never
/// reordered. Only `first_deleted` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub attribute_names: Vec<String>,
    pub attribute_types: Vec<TypeDescriptor>,
    pub primary_key: String,
    /// Head of the free-list, `None` when no slot is deleted
    pub first_deleted: Option<Position>,
}

impl TableMetadata {
    /// Create metadata for a new table with an empty free-list
    pub fn new(
        attribute_names: Vec<String>,
        attribute_types: Vec<TypeDescriptor>,
        primary_key: impl Into<String>,
    ) -> Result<Self> {
        let metadata = Self {
            attribute_names,
            attribute_types,
            primary_key: primary_key.into(),
            first_deleted: None,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check the structural invariants of the schema
    pub fn validate(&self) -> Result<()> {
        if self.attribute_names.is_empty() {
            return Err(StoreError::Schema("a table needs at least one attribute".to_string()));
        }
        if self.attribute_names.len() != self.attribute_types.len() {
            return Err(StoreError::Schema(format!(
                "{} attribute names but {} types",
                self.attribute_names.len(),
                self.attribute_types.len()
            )));
        }
        if self.attribute_names.len() > MAX_ATTRIBUTES {
            return Err(StoreError::Schema(format!(
                "{} attributes exceed the limit of {}",
                self.attribute_names.len(),
                MAX_ATTRIBUTES
            )));
        }

        let mut seen = HashSet::new();
        for name in &self.attribute_names {
            check_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(StoreError::Schema(format!("duplicate attribute '{}'", name)));
            }
        }
        for ty in &self.attribute_types {
            ty.validate()?;
        }

        self.get_attribute_idx(&self.primary_key)?;
        Ok(())
    }

    /// Position of `name` in the schema
    pub fn get_attribute_idx(&self, name: &str) -> Result<usize> {
        self.attribute_names
            .iter()
            .position(|attribute| attribute == name)
            .ok_or_else(|| StoreError::AttributeNotFound(name.to_string()))
    }

    /// Sum of all attribute widths
    pub fn record_size(&self) -> usize {
        self.attribute_types.iter().map(|ty| ty.width()).sum()
    }

    /// Width of a slot body: the record, or the free-list pointer if larger
    pub fn slot_body_size(&self) -> usize {
        self.record_size().max(FREE_POINTER_SIZE)
    }

    /// Number of slots in a data file of `data_len` bytes
    pub fn record_count(&self, data_len: u64) -> u64 {
        data_len / (1 + self.slot_body_size() as u64)
    }

    /// True when both describe the same columns and primary key
    pub fn same_schema(&self, other: &TableMetadata) -> bool {
        self.attribute_names == other.attribute_names
            && self.attribute_types == other.attribute_types
            && self.primary_key == other.primary_key
    }

    /// Serialize into exactly [`METADATA_SIZE`] bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buf = Vec::with_capacity(METADATA_SIZE);
        buf.put_slice(METADATA_MAGIC);
        buf.put_u16_le(METADATA_VERSION);
        buf.put_u16_le(self.attribute_names.len() as u16);
        buf.put_i64_le(encode_position(self.first_deleted));
        put_name(&mut buf, &self.primary_key);

        for (name, ty) in self.attribute_names.iter().zip(&self.attribute_types) {
            buf.put_u8(ty.kind as u8);
            buf.put_u16_le(ty.size);
            put_name(&mut buf, name);
        }
        let unused = MAX_ATTRIBUTES - self.attribute_names.len();
        buf.put_bytes(0, unused * ATTRIBUTE_SLOT_SIZE);

        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);

        debug_assert_eq!(buf.len(), METADATA_SIZE);
        Ok(buf)
    }

    /// Parse a block read from the metadata file of `table`
    pub fn decode(table: &str, bytes: &[u8]) -> Result<Self> {
        let corrupted = |reason: String| StoreError::MetadataCorrupted {
            table: table.to_string(),
            reason,
        };

        if bytes.len() != METADATA_SIZE {
            return Err(corrupted(format!(
                "expected {} bytes, got {}",
                METADATA_SIZE,
                bytes.len()
            )));
        }

        let (body, mut crc_bytes) = bytes.split_at(METADATA_SIZE - CRC_SIZE);
        let stored_crc = crc_bytes.get_u32_le();
        let computed_crc = crc32fast::hash(body);
        if stored_crc != computed_crc {
            return Err(corrupted(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, computed_crc
            )));
        }

        let mut buf = body;
        if &buf[..4] != METADATA_MAGIC {
            return Err(corrupted(format!("bad magic {:?}", &buf[..4])));
        }
        buf.advance(4);

        let version = buf.get_u16_le();
        if version != METADATA_VERSION {
            return Err(corrupted(format!("unsupported version {}", version)));
        }

        let count = buf.get_u16_le() as usize;
        if count == 0 || count > MAX_ATTRIBUTES {
            return Err(corrupted(format!("attribute count {} out of range", count)));
        }

        let first_deleted = decode_position(buf.get_i64_le())
            .ok_or_else(|| corrupted("negative free-list head".to_string()))?;
        let primary_key = get_name(&mut buf).map_err(corrupted)?;

        let mut attribute_names = Vec::with_capacity(count);
        let mut attribute_types = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = TypeKind::try_from(buf.get_u8())?;
            let size = buf.get_u16_le();
            let ty = TypeDescriptor::from_parts(kind, size).map_err(|e| corrupted(e.to_string()))?;
            attribute_types.push(ty);
            attribute_names.push(get_name(&mut buf).map_err(corrupted)?);
        }

        let metadata = Self {
            attribute_names,
            attribute_types,
            primary_key,
            first_deleted,
        };
        metadata.validate().map_err(|e| corrupted(e.to_string()))?;
        Ok(metadata)
    }
}

/// Names end up in index snapshot paths, so they must be plain file names
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(StoreError::Schema(format!(
            "name '{}' must be 1 to {} bytes",
            name, MAX_NAME_LEN
        )));
    }
    if !is_path_component(name) {
        return Err(StoreError::Schema(format!(
            "name {:?} may not be '.', '..' or contain path separators",
            name
        )));
    }
    Ok(())
}

fn put_name(buf: &mut Vec<u8>, name: &str) {
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, MAX_NAME_LEN - name.len());
}

fn get_name(buf: &mut &[u8]) -> std::result::Result<String, String> {
    let len = buf.get_u8() as usize;
    if len > MAX_NAME_LEN {
        return Err(format!("name length {} exceeds {}", len, MAX_NAME_LEN));
    }
    let raw = &buf[..len];
    let name = std::str::from_utf8(raw)
        .map_err(|e| format!("name is not UTF-8: {}", e))?
        .to_string();
    buf.advance(MAX_NAME_LEN);
    Ok(name)
}
