//! AVL Index
//!
//! Height-balanced binary search tree. Keys are unique: adding a key that is
//! already present is rejected with an empty response.

use std::cmp::Ordering;

use crate::heap::Position;

use super::{Index, IndexKey, Response};

type Link<K> = Option<Box<Node<K>>>;

#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    position: Position,
    height: i32,
    left: Link<K>,
    right: Link<K>,
}

impl<K> Node<K> {
    fn leaf(key: K, position: Position) -> Self {
        Self {
            key,
            position,
            height: 1,
            left: None,
            right: None,
        }
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height<K>(link: &Link<K>) -> i32 {
    link.as_ref().map_or(0, |node| node.height)
}

/// AVL tree index over keys of type `K`
#[derive(Debug, Clone)]
pub struct AvlIndex<K> {
    table_name: String,
    attribute_name: String,
    root: Link<K>,
    len: usize,
}

impl<K: IndexKey> AvlIndex<K> {
    /// Height of the tree (0 when empty)
    pub fn height(&self) -> usize {
        height(&self.root) as usize
    }
}

impl<K: IndexKey> Index<K> for AvlIndex<K> {
    fn new(table_name: &str, attribute_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            attribute_name: attribute_name.to_string(),
            root: None,
            len: 0,
        }
    }

    fn search(&self, key: &K) -> Response {
        Response::measure(|| {
            let mut current = &self.root;
            while let Some(node) = current {
                match key.compare(&node.key) {
                    Ordering::Less => current = &node.left,
                    Ordering::Greater => current = &node.right,
                    Ordering::Equal => return vec![node.position],
                }
            }
            Vec::new()
        })
    }

    fn range_search(&self, begin: &K, end: &K) -> Response {
        Response::measure(|| {
            let mut positions = Vec::new();
            if begin.compare(end) != Ordering::Greater {
                collect_range(&self.root, begin, end, &mut positions);
            }
            positions
        })
    }

    fn add(&mut self, key: K, position: Position) -> Response {
        Response::measure(|| {
            let mut inserted = false;
            let root = self.root.take();
            self.root = Some(insert(root, key, position, &mut inserted));
            if inserted {
                self.len += 1;
                vec![position]
            } else {
                Vec::new()
            }
        })
    }

    fn remove(&mut self, key: &K) -> Response {
        Response::measure(|| {
            let mut removed = None;
            let root = self.root.take();
            self.root = remove(root, key, &mut removed);
            match removed {
                Some(position) => {
                    self.len -= 1;
                    vec![position]
                }
                None => Vec::new(),
            }
        })
    }

    fn entries(&self) -> Vec<(K, Position)> {
        let mut out = Vec::with_capacity(self.len);
        collect_all(&self.root, &mut out);
        out
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

// =============================================================================
// Tree Operations
// =============================================================================

fn rotate_right<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    let mut pivot = match node.left.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    pivot
}

fn rotate_left<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    let mut pivot = match node.right.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    pivot
}

fn rebalance<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    node.update_height();
    let balance = node.balance_factor();

    if balance > 1 {
        if node.left.as_ref().is_some_and(|left| left.balance_factor() < 0) {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if node.right.as_ref().is_some_and(|right| right.balance_factor() > 0) {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

fn insert<K: IndexKey>(
    link: Link<K>,
    key: K,
    position: Position,
    inserted: &mut bool,
) -> Box<Node<K>> {
    let mut node = match link {
        Some(node) => node,
        None => {
            *inserted = true;
            return Box::new(Node::leaf(key, position));
        }
    };

    match key.compare(&node.key) {
        Ordering::Less => node.left = Some(insert(node.left.take(), key, position, inserted)),
        Ordering::Greater => node.right = Some(insert(node.right.take(), key, position, inserted)),
        Ordering::Equal => return node,
    }
    rebalance(node)
}

fn remove<K: IndexKey>(link: Link<K>, key: &K, removed: &mut Option<Position>) -> Link<K> {
    let mut node = link?;

    match key.compare(&node.key) {
        Ordering::Less => node.left = remove(node.left.take(), key, removed),
        Ordering::Greater => node.right = remove(node.right.take(), key, removed),
        Ordering::Equal => {
            *removed = Some(node.position);
            match (node.left.take(), node.right.take()) {
                (None, None) => return None,
                (Some(child), None) | (None, Some(child)) => return Some(child),
                (Some(left), Some(right)) => {
                    let (rest, successor) = take_min(right);
                    node.key = successor.key;
                    node.position = successor.position;
                    node.left = Some(left);
                    node.right = rest;
                }
            }
        }
    }
    Some(rebalance(node))
}

/// Detach the minimum node of a subtree; returns (remaining subtree, min)
fn take_min<K>(mut node: Box<Node<K>>) -> (Link<K>, Box<Node<K>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn collect_range<K: IndexKey>(link: &Link<K>, begin: &K, end: &K, out: &mut Vec<Position>) {
    let Some(node) = link else { return };

    let above_begin = node.key.compare(begin) != Ordering::Less;
    let below_end = node.key.compare(end) != Ordering::Greater;

    if above_begin {
        collect_range(&node.left, begin, end, out);
    }
    if above_begin && below_end {
        out.push(node.position);
    }
    if below_end {
        collect_range(&node.right, begin, end, out);
    }
}

fn collect_all<K: Clone>(link: &Link<K>, out: &mut Vec<(K, Position)>) {
    if let Some(node) = link {
        collect_all(&node.left, out);
        out.push((node.key.clone(), node.position));
        collect_all(&node.right, out);
    }
}
