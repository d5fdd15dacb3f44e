//! # heaptable
//!
//! An embedded single-table storage engine with:
//! - Fixed-width binary records in a heap file addressed by byte offset
//! - Free-list reuse of deleted slots, threaded through the slots themselves
//! - A fixed-size, checksummed table metadata block
//! - Secondary indexes (sequential, AVL, ISAM) over int, float or text keys
//!   behind one type-erased container
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Coordination layer (caller)                    │
//! │      resolves keys through an index, rows through a heap    │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!   ┌──────────────────────────┐   ┌──────────────────────────┐
//!   │     IndexContainer<F>    │   │        HeapFile          │
//!   │  key → position(s)       │   │  position → Record       │
//!   └────────────┬─────────────┘   └────────────┬─────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌──────────────────────────┐   ┌──────────────────────────┐
//!   │ Sequential / AVL / ISAM  │   │ data.bin   metadata.bin  │
//!   │ over i32 / f32 / String  │   │ (slots)    (schema)      │
//!   └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! The index container and the heap file never call each other.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod types;
pub mod record;
pub mod heap;
pub mod index;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use types::{Attribute, TypeDescriptor, TypeKind, Value};
pub use record::Record;
pub use heap::{HeapFile, Position, TableMetadata};
pub use index::{
    Algorithm, AvlIndexContainer, IndexContainer, IsamIndexContainer, KeyKind, Response,
    SequentialIndexContainer,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of heaptable
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
