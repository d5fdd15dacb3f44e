//! Index Module
//!
//! Secondary indexes mapping key values to heap file positions.
//!
//! ## Responsibilities
//! - Define the contract every index algorithm satisfies ([`Index`])
//! - Provide three algorithms: sequential, AVL tree and ISAM
//! - Erase the key type behind one container ([`IndexContainer`])
//! - Persist index contents as checksummed snapshots
//!
//! ## Type Layers
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │ IndexContainer<F>          (one algorithm family) │
//! │   TypedIndex<F>                                   │
//! │   ├── Int(F::Index<i32>)                          │
//! │   ├── Float(F::Index<f32>)                        │
//! │   └── Text(F::Index<String>)                      │
//! └───────────────────────────────────────────────────┘
//! F ∈ { Sequential, Avl, Isam }
//! ```
//!
//! ## Duplicate Keys
//! - Sequential: multi-map, every association is kept
//! - AVL: unique, adding an existing key is rejected
//! - ISAM: multi-map, every association is kept

mod avl;
mod container;
mod isam;
mod sequential;
mod snapshot;

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::heap::Position;
use crate::types::TypeKind;

pub use avl::AvlIndex;
pub use container::{AvlIndexContainer, IndexContainer, IsamIndexContainer, SequentialIndexContainer};
pub use isam::{IsamIndex, ISAM_PAGE_CAPACITY};
pub use sequential::{SequentialIndex, AUX_CAPACITY};

// =============================================================================
// Response
// =============================================================================

/// Result of an index operation: matching positions plus elapsed time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub positions: Vec<Position>,
    pub elapsed: Duration,
}

impl Response {
    pub fn new(positions: Vec<Position>, elapsed: Duration) -> Self {
        Self { positions, elapsed }
    }

    /// Run `op` and attach its wall-clock duration
    pub fn measure(op: impl FnOnce() -> Vec<Position>) -> Self {
        let start = Instant::now();
        let positions = op();
        Self::new(positions, start.elapsed())
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// Key Kinds
// =============================================================================

/// Key types an index can be built over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyKind {
    Int = 0x01,
    Float = 0x02,
    Text = 0x03,
}

impl KeyKind {
    /// Key kind used for an attribute of kind `kind`
    pub fn for_type(kind: TypeKind) -> Result<Self> {
        match kind {
            TypeKind::Int => Ok(KeyKind::Int),
            TypeKind::Float => Ok(KeyKind::Float),
            TypeKind::Varchar => Ok(KeyKind::Text),
            TypeKind::Bool => Err(StoreError::UnsupportedKeyType(kind)),
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(KeyKind::Int),
            0x02 => Some(KeyKind::Float),
            0x03 => Some(KeyKind::Text),
            _ => None,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::Int => "int",
            KeyKind::Float => "float",
            KeyKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Index algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    Sequential = 0x01,
    Avl = 0x02,
    Isam = 0x03,
}

impl Algorithm {
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Algorithm::Sequential),
            0x02 => Some(Algorithm::Avl),
            0x03 => Some(Algorithm::Isam),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Sequential => "sequential",
            Algorithm::Avl => "avl",
            Algorithm::Isam => "isam",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Algorithm {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Algorithm::Sequential),
            "avl" => Ok(Algorithm::Avl),
            "isam" => Ok(Algorithm::Isam),
            other => Err(StoreError::Config(format!("unknown index algorithm '{}'", other))),
        }
    }
}

// =============================================================================
// Index Contract
// =============================================================================

/// A key type an index can be instantiated over
///
/// `wrap`/`project` move between a concrete `F::Index<Self>` and the tagged
/// [`TypedIndex`], which is how the container checks key types at runtime.
pub trait IndexKey: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {
    const KIND: KeyKind;

    /// Total order used by every index
    fn compare(&self, other: &Self) -> Ordering;

    fn wrap<F: IndexFamily>(index: F::Index<Self>) -> TypedIndex<F>;

    fn project<F: IndexFamily>(index: &TypedIndex<F>) -> Option<&F::Index<Self>>;

    fn project_mut<F: IndexFamily>(index: &mut TypedIndex<F>) -> Option<&mut F::Index<Self>>;
}

impl IndexKey for i32 {
    const KIND: KeyKind = KeyKind::Int;

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn wrap<F: IndexFamily>(index: F::Index<Self>) -> TypedIndex<F> {
        TypedIndex::Int(index)
    }

    fn project<F: IndexFamily>(index: &TypedIndex<F>) -> Option<&F::Index<Self>> {
        match index {
            TypedIndex::Int(idx) => Some(idx),
            _ => None,
        }
    }

    fn project_mut<F: IndexFamily>(index: &mut TypedIndex<F>) -> Option<&mut F::Index<Self>> {
        match index {
            TypedIndex::Int(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexKey for f32 {
    const KIND: KeyKind = KeyKind::Float;

    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn wrap<F: IndexFamily>(index: F::Index<Self>) -> TypedIndex<F> {
        TypedIndex::Float(index)
    }

    fn project<F: IndexFamily>(index: &TypedIndex<F>) -> Option<&F::Index<Self>> {
        match index {
            TypedIndex::Float(idx) => Some(idx),
            _ => None,
        }
    }

    fn project_mut<F: IndexFamily>(index: &mut TypedIndex<F>) -> Option<&mut F::Index<Self>> {
        match index {
            TypedIndex::Float(idx) => Some(idx),
            _ => None,
        }
    }
}

impl IndexKey for String {
    const KIND: KeyKind = KeyKind::Text;

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn wrap<F: IndexFamily>(index: F::Index<Self>) -> TypedIndex<F> {
        TypedIndex::Text(index)
    }

    fn project<F: IndexFamily>(index: &TypedIndex<F>) -> Option<&F::Index<Self>> {
        match index {
            TypedIndex::Text(idx) => Some(idx),
            _ => None,
        }
    }

    fn project_mut<F: IndexFamily>(index: &mut TypedIndex<F>) -> Option<&mut F::Index<Self>> {
        match index {
            TypedIndex::Text(idx) => Some(idx),
            _ => None,
        }
    }
}

/// Contract every index algorithm satisfies for a key type `K`
pub trait Index<K: IndexKey> {
    /// Empty index over `table_name.attribute_name`
    fn new(table_name: &str, attribute_name: &str) -> Self
    where
        Self: Sized;

    /// Positions stored under `key`; empty when absent
    fn search(&self, key: &K) -> Response;

    /// Positions of every key in `[begin, end]`, in key order
    fn range_search(&self, begin: &K, end: &K) -> Response;

    /// Insert one association; the response is non-empty iff it was accepted
    fn add(&mut self, key: K, position: Position) -> Response;

    /// Drop every association of `key`; returns the removed positions
    fn remove(&mut self, key: &K) -> Response;

    /// Insert many associations, reporting one flag per input in input order
    ///
    /// The response carries the positions of accepted entries and the total
    /// elapsed time.
    fn bulk_insert(&mut self, entries: Vec<(K, Position)>) -> (Response, Vec<bool>) {
        let start = Instant::now();
        let mut accepted = Vec::new();
        let mut flags = Vec::with_capacity(entries.len());

        for (key, position) in entries {
            let response = self.add(key, position);
            flags.push(!response.is_empty());
            accepted.extend(response.positions);
        }

        (Response::new(accepted, start.elapsed()), flags)
    }

    /// Every association in key order
    fn entries(&self) -> Vec<(K, Position)>;

    /// Number of associations
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn attribute_name(&self) -> &str;

    fn table_name(&self) -> &str;
}

// =============================================================================
// Algorithm Families
// =============================================================================

/// An index algorithm, generic over the key type
pub trait IndexFamily: 'static {
    const ALGORITHM: Algorithm;

    type Index<K: IndexKey>: Index<K>;
}

/// Sequential index family
#[derive(Debug, Clone, Copy)]
pub struct Sequential;

/// AVL tree index family
#[derive(Debug, Clone, Copy)]
pub struct Avl;

/// ISAM index family
#[derive(Debug, Clone, Copy)]
pub struct Isam;

impl IndexFamily for Sequential {
    const ALGORITHM: Algorithm = Algorithm::Sequential;
    type Index<K: IndexKey> = SequentialIndex<K>;
}

impl IndexFamily for Avl {
    const ALGORITHM: Algorithm = Algorithm::Avl;
    type Index<K: IndexKey> = AvlIndex<K>;
}

impl IndexFamily for Isam {
    const ALGORITHM: Algorithm = Algorithm::Isam;
    type Index<K: IndexKey> = IsamIndex<K>;
}

/// One index of family `F` over exactly one key kind
pub enum TypedIndex<F: IndexFamily> {
    Int(F::Index<i32>),
    Float(F::Index<f32>),
    Text(F::Index<String>),
}

impl<F: IndexFamily> TypedIndex<F> {
    /// Empty index of key kind `kind`
    pub fn empty(kind: KeyKind, table_name: &str, attribute_name: &str) -> Self {
        match kind {
            KeyKind::Int => {
                TypedIndex::Int(<F::Index<i32> as Index<i32>>::new(table_name, attribute_name))
            }
            KeyKind::Float => {
                TypedIndex::Float(<F::Index<f32> as Index<f32>>::new(table_name, attribute_name))
            }
            KeyKind::Text => TypedIndex::Text(<F::Index<String> as Index<String>>::new(
                table_name,
                attribute_name,
            )),
        }
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            TypedIndex::Int(_) => KeyKind::Int,
            TypedIndex::Float(_) => KeyKind::Float,
            TypedIndex::Text(_) => KeyKind::Text,
        }
    }
}
