//! Sequential Index
//!
//! Sorted main area plus a small unsorted auxiliary area.
//!
//! ## Layout
//! ```text
//! main: [(k0,p0) (k1,p1) ... (kn,pn)]   sorted by key, binary searched
//! aux:  [(ka,pa) (kb,pb) ...]           insertion order, scanned linearly
//! ```
//! New entries land in `aux`; once it holds [`AUX_CAPACITY`] entries it is
//! merged into `main`. Duplicate keys are kept.

use std::cmp::Ordering;

use crate::heap::Position;

use super::{Index, IndexKey, Response};

/// Entries held in the auxiliary area before a merge
pub const AUX_CAPACITY: usize = 16;

/// Sequential file style index over keys of type `K`
#[derive(Debug, Clone)]
pub struct SequentialIndex<K> {
    table_name: String,
    attribute_name: String,
    /// Sorted by key; equal keys keep insertion order
    main: Vec<(K, Position)>,
    /// Unsorted overflow
    aux: Vec<(K, Position)>,
}

impl<K: IndexKey> SequentialIndex<K> {
    /// Number of entries waiting in the auxiliary area
    pub fn aux_len(&self) -> usize {
        self.aux.len()
    }

    /// Move the auxiliary area into the main area
    pub fn merge(&mut self) {
        if self.aux.is_empty() {
            return;
        }
        self.main.append(&mut self.aux);
        self.main.sort_by(|a, b| a.0.compare(&b.0));
    }

    /// Slice of `main` whose keys fall in `[begin, end]`
    fn main_range(&self, begin: &K, end: &K) -> &[(K, Position)] {
        let lo = self
            .main
            .partition_point(|(k, _)| k.compare(begin) == Ordering::Less);
        let hi = self
            .main
            .partition_point(|(k, _)| k.compare(end) != Ordering::Greater);
        &self.main[lo..hi.max(lo)]
    }
}

impl<K: IndexKey> Index<K> for SequentialIndex<K> {
    fn new(table_name: &str, attribute_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            attribute_name: attribute_name.to_string(),
            main: Vec::new(),
            aux: Vec::new(),
        }
    }

    fn search(&self, key: &K) -> Response {
        Response::measure(|| {
            self.main_range(key, key)
                .iter()
                .chain(self.aux.iter().filter(|(k, _)| k.compare(key) == Ordering::Equal))
                .map(|(_, pos)| *pos)
                .collect()
        })
    }

    fn range_search(&self, begin: &K, end: &K) -> Response {
        Response::measure(|| {
            if begin.compare(end) == Ordering::Greater {
                return Vec::new();
            }

            let mut hits: Vec<&(K, Position)> = self.main_range(begin, end).iter().collect();
            hits.extend(self.aux.iter().filter(|(k, _)| {
                k.compare(begin) != Ordering::Less && k.compare(end) != Ordering::Greater
            }));
            hits.sort_by(|a, b| a.0.compare(&b.0));
            hits.into_iter().map(|(_, pos)| *pos).collect()
        })
    }

    fn add(&mut self, key: K, position: Position) -> Response {
        Response::measure(|| {
            self.aux.push((key, position));
            if self.aux.len() >= AUX_CAPACITY {
                self.merge();
            }
            vec![position]
        })
    }

    fn remove(&mut self, key: &K) -> Response {
        Response::measure(|| {
            let mut removed = Vec::new();
            for area in [&mut self.main, &mut self.aux] {
                area.retain(|(k, pos)| {
                    let hit = k.compare(key) == Ordering::Equal;
                    if hit {
                        removed.push(*pos);
                    }
                    !hit
                });
            }
            removed
        })
    }

    /// Sorts once instead of merging every [`AUX_CAPACITY`] entries
    fn bulk_insert(&mut self, entries: Vec<(K, Position)>) -> (Response, Vec<bool>) {
        let flags = vec![true; entries.len()];
        let response = Response::measure(|| {
            let positions: Vec<Position> = entries.iter().map(|(_, pos)| *pos).collect();
            self.aux.extend(entries);
            self.merge();
            positions
        });
        (response, flags)
    }

    fn entries(&self) -> Vec<(K, Position)> {
        let mut all: Vec<(K, Position)> = self.main.iter().chain(&self.aux).cloned().collect();
        all.sort_by(|a, b| a.0.compare(&b.0));
        all
    }

    fn len(&self) -> usize {
        self.main.len() + self.aux.len()
    }

    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}
