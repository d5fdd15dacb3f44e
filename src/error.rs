//! Error types for heaptable
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::heap::Position;
use crate::index::KeyKind;
use crate::types::TypeKind;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for heaptable operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Unknown type tag: 0x{0:02x}")]
    UnknownType(u8),

    #[error("Invalid record format: {0}")]
    InvalidRecordFormat(String),

    #[error("Value too long: {length} bytes (max {max})")]
    ValueTooLong { length: usize, max: usize },

    // -------------------------------------------------------------------------
    // Heap File Errors
    // -------------------------------------------------------------------------
    #[error("Metadata of table {table} corrupted: {reason}")]
    MetadataCorrupted { table: String, reason: String },

    #[error("Invalid position {position} in table {table}")]
    InvalidPosition { table: String, position: Position },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Key type mismatch: index is keyed by {expected}, got {found}")]
    KeyTypeMismatch { expected: KeyKind, found: KeyKind },

    #[error("Key not found")]
    KeyNotFound,

    #[error("Attributes of type {0} cannot be indexed")]
    UnsupportedKeyType(TypeKind),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
