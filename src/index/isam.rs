//! ISAM Index
//!
//! Indexed sequential access: static sorted pages located through a sparse
//! index of fence keys, with an overflow area per page.
//!
//! ## Layout
//! ```text
//! fences:  [ f0        | f1        | f2        ]   first key of each page
//! pages:   [ page 0    | page 1    | page 2    ]   sorted, built once
//!              │           │           │
//! overflow:  [...]       [...]       [...]         later inserts, unsorted
//! ```
//!
//! The static area is built by the first `bulk_insert` into an empty index
//! (or by the first `add`). Keys may repeat.

use std::cmp::Ordering;
use std::time::Instant;

use crate::heap::Position;

use super::{Index, IndexKey, Response};

/// Entries per static page
pub const ISAM_PAGE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
struct Page<K> {
    /// Sorted by key, fixed after the build
    entries: Vec<(K, Position)>,
    overflow: Vec<(K, Position)>,
}

/// ISAM index over keys of type `K`
#[derive(Debug, Clone)]
pub struct IsamIndex<K> {
    table_name: String,
    attribute_name: String,
    fences: Vec<K>,
    pages: Vec<Page<K>>,
    len: usize,
}

impl<K: IndexKey> IsamIndex<K> {
    /// Number of static pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Entries living in overflow areas
    pub fn overflow_len(&self) -> usize {
        self.pages.iter().map(|page| page.overflow.len()).sum()
    }

    /// Rebuild the static area from `entries`
    fn build(&mut self, mut entries: Vec<(K, Position)>) {
        entries.sort_by(|a, b| a.0.compare(&b.0));
        self.len = entries.len();
        self.fences.clear();
        self.pages.clear();

        let mut entries = entries.into_iter().peekable();
        while entries.peek().is_some() {
            let chunk: Vec<_> = entries.by_ref().take(ISAM_PAGE_CAPACITY).collect();
            self.fences.push(chunk[0].0.clone());
            self.pages.push(Page {
                entries: chunk,
                overflow: Vec::new(),
            });
        }
    }

    /// Page receiving overflow for `key`: the last page whose fence is <= key
    fn overflow_page(&self, key: &K) -> usize {
        self.fences
            .partition_point(|fence| fence.compare(key) != Ordering::Greater)
            .saturating_sub(1)
    }

    /// Pages that may hold keys in `[begin, end]`
    fn candidate_pages(&self, begin: &K, end: &K) -> std::ops::Range<usize> {
        let start = self
            .fences
            .partition_point(|fence| fence.compare(begin) == Ordering::Less)
            .saturating_sub(1);
        let stop = self
            .fences
            .partition_point(|fence| fence.compare(end) != Ordering::Greater)
            .max(start + 1)
            .min(self.pages.len());
        start..stop
    }

    /// Matching entries in key order
    fn collect(&self, begin: &K, end: &K) -> Vec<(K, Position)> {
        let in_range =
            |k: &K| k.compare(begin) != Ordering::Less && k.compare(end) != Ordering::Greater;

        let mut hits: Vec<(K, Position)> = Vec::new();
        for page in &self.pages[self.candidate_pages(begin, end)] {
            let lo = page
                .entries
                .partition_point(|(k, _)| k.compare(begin) == Ordering::Less);
            hits.extend(
                page.entries[lo..]
                    .iter()
                    .take_while(|(k, _)| k.compare(end) != Ordering::Greater)
                    .cloned(),
            );
            hits.extend(page.overflow.iter().filter(|(k, _)| in_range(k)).cloned());
        }
        hits.sort_by(|a, b| a.0.compare(&b.0));
        hits
    }
}

impl<K: IndexKey> Index<K> for IsamIndex<K> {
    fn new(table_name: &str, attribute_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            attribute_name: attribute_name.to_string(),
            fences: Vec::new(),
            pages: Vec::new(),
            len: 0,
        }
    }

    fn search(&self, key: &K) -> Response {
        Response::measure(|| self.collect(key, key).into_iter().map(|(_, pos)| pos).collect())
    }

    fn range_search(&self, begin: &K, end: &K) -> Response {
        Response::measure(|| {
            if begin.compare(end) == Ordering::Greater {
                return Vec::new();
            }
            self.collect(begin, end).into_iter().map(|(_, pos)| pos).collect()
        })
    }

    fn add(&mut self, key: K, position: Position) -> Response {
        Response::measure(|| {
            if self.pages.is_empty() {
                self.build(vec![(key, position)]);
            } else {
                let page = self.overflow_page(&key);
                self.pages[page].overflow.push((key, position));
                self.len += 1;
            }
            vec![position]
        })
    }

    fn remove(&mut self, key: &K) -> Response {
        Response::measure(|| {
            let mut removed = Vec::new();
            let range = self.candidate_pages(key, key);
            for page in &mut self.pages[range] {
                for area in [&mut page.entries, &mut page.overflow] {
                    area.retain(|(k, pos)| {
                        let hit = k.compare(key) == Ordering::Equal;
                        if hit {
                            removed.push(*pos);
                        }
                        !hit
                    });
                }
            }
            self.len -= removed.len();
            removed
        })
    }

    /// Builds the static area when the index is empty, otherwise overflows
    fn bulk_insert(&mut self, entries: Vec<(K, Position)>) -> (Response, Vec<bool>) {
        let start = Instant::now();
        let flags = vec![true; entries.len()];
        let positions: Vec<Position> = entries.iter().map(|(_, pos)| *pos).collect();

        if self.len == 0 {
            self.build(entries);
        } else {
            for (key, position) in entries {
                let page = self.overflow_page(&key);
                self.pages[page].overflow.push((key, position));
                self.len += 1;
            }
        }

        (Response::new(positions, start.elapsed()), flags)
    }

    fn entries(&self) -> Vec<(K, Position)> {
        let mut all: Vec<(K, Position)> = self
            .pages
            .iter()
            .flat_map(|page| page.entries.iter().chain(&page.overflow))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.0.compare(&b.0));
        all
    }

    fn len(&self) -> usize {
        self.len
    }

    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}
