//! Heap Module
//!
//! Positional record storage for one table.
//!
//! ## Responsibilities
//! - Own the data file and metadata block of a table
//! - Append records and hand out their byte offsets
//! - Logically delete slots and recycle them through a free-list
//! - Persist the schema header on every mutation
//!
//! ## Data File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Slot 0 @ offset 0                                       │
//! │   Tag (1) | Body (max(record_size, 8))                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Slot 1 @ offset slot_size                               │
//! │   ...                                                   │
//! └─────────────────────────────────────────────────────────┘
//!
//! LIVE    (0x01): body = packed record fields, zero-filled tail
//! DELETED (0x02): body = next free slot as i64 LE (-1 = end of list)
//! ```

mod file;
mod metadata;

pub use file::HeapFile;
pub use metadata::{
    TableMetadata, MAX_ATTRIBUTES, MAX_NAME_LEN, METADATA_MAGIC, METADATA_SIZE, METADATA_VERSION,
};

/// Byte offset of a slot in the data file
pub type Position = u64;

/// On-disk sentinel for "no deleted slot"
pub(crate) const NO_DELETED: i64 = -1;

/// Tag byte of a slot holding a record
pub(crate) const SLOT_LIVE: u8 = 0x01;

/// Tag byte of a slot threaded into the free-list
pub(crate) const SLOT_DELETED: u8 = 0x02;

/// Size of the slot tag
pub(crate) const SLOT_TAG_SIZE: u64 = 1;

/// Size of the free-list pointer stored in a deleted slot
pub(crate) const FREE_POINTER_SIZE: usize = 8;

/// Encode an optional position with the -1 sentinel
pub(crate) fn encode_position(pos: Option<Position>) -> i64 {
    pos.map(|p| p as i64).unwrap_or(NO_DELETED)
}

/// Decode a sentinel-encoded position; other negative values are invalid
pub(crate) fn decode_position(raw: i64) -> Option<Option<Position>> {
    match raw {
        NO_DELETED => Some(None),
        p if p >= 0 => Some(Some(p as Position)),
        _ => None,
    }
}
