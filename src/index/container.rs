//! Index Container
//!
//! Holds one index of a fixed algorithm over exactly one key kind and
//! forwards typed operations to it. Using a key of any other kind fails with
//! [`StoreError::KeyTypeMismatch`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::heap::{HeapFile, Position};

use super::{
    snapshot, Algorithm, Avl, Index, IndexFamily, IndexKey, Isam, KeyKind, Response, Sequential,
    TypedIndex,
};

/// Type-erased index of algorithm family `F`
///
/// The key kind is chosen at construction and never changes.
pub struct IndexContainer<F: IndexFamily> {
    index: TypedIndex<F>,
}

/// Container over sequential indexes
pub type SequentialIndexContainer = IndexContainer<Sequential>;

/// Container over AVL indexes
pub type AvlIndexContainer = IndexContainer<Avl>;

/// Container over ISAM indexes
pub type IsamIndexContainer = IndexContainer<Isam>;

impl<F: IndexFamily> IndexContainer<F> {
    /// Wrap an existing index keyed by `K`
    pub fn new<K: IndexKey>(index: F::Index<K>) -> Self {
        Self {
            index: K::wrap(index),
        }
    }

    /// Empty index of key kind `kind`
    pub fn empty(kind: KeyKind, table_name: &str, attribute_name: &str) -> Self {
        Self {
            index: TypedIndex::empty(kind, table_name, attribute_name),
        }
    }

    /// Empty index over `attribute_name` of `heap`, keyed by the attribute's type
    pub fn for_attribute(heap: &HeapFile, attribute_name: &str) -> Result<Self> {
        let ty = heap.get_type(attribute_name)?;
        let kind = KeyKind::for_type(ty.kind)?;
        Ok(Self::empty(kind, heap.table_name(), attribute_name))
    }

    // =========================================================================
    // Typed Operations
    // =========================================================================

    /// First position stored under `key`
    ///
    /// Fails with `KeyNotFound` when the index has no entry for the key.
    pub fn search<K: IndexKey>(&self, key: K) -> Result<(Position, Duration)> {
        let response = self.typed::<K>()?.search(&key);
        first(response)
    }

    /// Positions of every key in `[begin, end]`, in key order
    pub fn range_search<K: IndexKey>(&self, begin: K, end: K) -> Result<Response> {
        Ok(self.typed::<K>()?.range_search(&begin, &end))
    }

    /// Insert one association; the flag tells whether the index accepted it
    pub fn add<K: IndexKey>(&mut self, key: K, position: Position) -> Result<(bool, Duration)> {
        let response = self.typed_mut::<K>()?.add(key, position);
        Ok((!response.is_empty(), response.elapsed))
    }

    /// Remove `key`, returning the first position it mapped to
    ///
    /// Fails with `KeyNotFound` when there was nothing to remove.
    pub fn remove<K: IndexKey>(&mut self, key: K) -> Result<(Position, Duration)> {
        let response = self.typed_mut::<K>()?.remove(&key);
        first(response)
    }

    /// Insert many associations, one success flag per input in input order
    pub fn bulk_insert<K: IndexKey>(
        &mut self,
        entries: Vec<(K, Position)>,
    ) -> Result<(Response, Vec<bool>)> {
        Ok(self.typed_mut::<K>()?.bulk_insert(entries))
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub fn get_attribute_name(&self) -> &str {
        match &self.index {
            TypedIndex::Int(idx) => idx.attribute_name(),
            TypedIndex::Float(idx) => idx.attribute_name(),
            TypedIndex::Text(idx) => idx.attribute_name(),
        }
    }

    pub fn get_table_name(&self) -> &str {
        match &self.index {
            TypedIndex::Int(idx) => idx.table_name(),
            TypedIndex::Float(idx) => idx.table_name(),
            TypedIndex::Text(idx) => idx.table_name(),
        }
    }

    /// Number of associations
    pub fn len(&self) -> usize {
        match &self.index {
            TypedIndex::Int(idx) => idx.len(),
            TypedIndex::Float(idx) => idx.len(),
            TypedIndex::Text(idx) => idx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_kind(&self) -> KeyKind {
        self.index.key_kind()
    }

    pub fn algorithm(&self) -> Algorithm {
        F::ALGORITHM
    }

    /// Borrow the wrapped index as keyed by `K`
    pub fn typed<K: IndexKey>(&self) -> Result<&F::Index<K>> {
        let expected = self.key_kind();
        K::project(&self.index).ok_or(StoreError::KeyTypeMismatch {
            expected,
            found: K::KIND,
        })
    }

    /// Mutably borrow the wrapped index as keyed by `K`
    pub fn typed_mut<K: IndexKey>(&mut self) -> Result<&mut F::Index<K>> {
        let expected = self.key_kind();
        K::project_mut(&mut self.index).ok_or(StoreError::KeyTypeMismatch {
            expected,
            found: K::KIND,
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write a snapshot of the index to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = match &self.index {
            TypedIndex::Int(idx) => snapshot::encode::<i32, _>(F::ALGORITHM, idx)?,
            TypedIndex::Float(idx) => snapshot::encode::<f32, _>(F::ALGORITHM, idx)?,
            TypedIndex::Text(idx) => snapshot::encode::<String, _>(F::ALGORITHM, idx)?,
        };
        snapshot::write_file(path, &bytes)?;

        info!(
            table = %self.get_table_name(),
            attribute = %self.get_attribute_name(),
            algorithm = %F::ALGORITHM,
            entries = self.len(),
            "Index snapshot saved"
        );
        Ok(())
    }

    /// Rebuild an index from the snapshot at `path`
    ///
    /// The snapshot must have been written by a container of the same
    /// algorithm.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let raw = snapshot::decode(&bytes)?;

        if raw.algorithm != F::ALGORITHM {
            return Err(StoreError::Serialization(format!(
                "snapshot {} holds a {} index, expected {}",
                path.display(),
                raw.algorithm,
                F::ALGORITHM
            )));
        }

        let index = match raw.key_kind {
            KeyKind::Int => TypedIndex::Int(snapshot::restore::<i32, F::Index<i32>>(raw.payload)?),
            KeyKind::Float => {
                TypedIndex::Float(snapshot::restore::<f32, F::Index<f32>>(raw.payload)?)
            }
            KeyKind::Text => {
                TypedIndex::Text(snapshot::restore::<String, F::Index<String>>(raw.payload)?)
            }
        };

        let container = Self { index };
        debug!(
            path = %path.display(),
            key_kind = %container.key_kind(),
            entries = container.len(),
            "Index snapshot loaded"
        );
        Ok(container)
    }
}

/// Narrow a response to its first position
fn first(response: Response) -> Result<(Position, Duration)> {
    response
        .positions
        .first()
        .map(|position| (*position, response.elapsed))
        .ok_or(StoreError::KeyNotFound)
}
