//! B-tree implementation for ordered in-memory storage
//!
//! This module provides a classic B-tree parameterized by its minimum
//! degree `t` and by a [`Compare`] strategy. It supports:
//! - Search, insertion and deletion in `O(log n)`
//! - Preemptive splitting on insert
//! - Borrow-or-merge rebalancing on the way down during delete
//! - Arbitrary key types, ordered by `Ord` or by a caller-supplied comparator
//!
//! Every non-root node holds between `t - 1` and `2t - 1` keys and all
//! leaves sit at the same depth.

mod arena;
mod compare;
mod error;
mod node;

#[cfg(test)]
mod scenario_tests;

pub use compare::{Compare, Natural, Reverse};
pub use error::{BTreeError, BTreeResult};
pub use node::NodeId;

use std::cmp::Ordering;
use std::fmt;
use std::io;

use tracing::debug;

use crate::config::TreeConfig;
use arena::NodeArena;
use node::{Node, Probe};

/// Smallest minimum degree for which splitting and merging are well defined
pub const MIN_DEGREE_FLOOR: usize = 2;

/// B-tree data structure
///
/// Minimum degree `t` means:
/// - Every node holds at most `2t - 1` keys
/// - Every node except the root holds at least `t - 1` keys
/// - Internal nodes hold one more child than keys
#[derive(Debug)]
pub struct BTree<T, C = Natural> {
    /// Root node ID (always present, possibly an empty leaf)
    root: NodeId,

    /// Minimum degree `t`
    min_degree: usize,

    /// Node storage
    arena: NodeArena<T>,

    /// Key ordering
    compare: C,

    /// Total number of keys in the tree
    len: usize,
}

impl<T: Ord> BTree<T, Natural> {
    /// Create a new empty B-tree ordered by `Ord`
    ///
    /// # Arguments
    /// * `min_degree` - The minimum degree `t` (must be >= 2)
    ///
    /// # Returns
    /// * `Ok(BTree)` - A new tree with an empty leaf root
    /// * `Err(BTreeError)` - If the minimum degree is invalid
    pub fn new(min_degree: usize) -> BTreeResult<Self> {
        Self::with_compare(min_degree, Natural)
    }

    /// Create a new empty B-tree from a [`TreeConfig`]
    pub fn from_config(config: &TreeConfig) -> BTreeResult<Self> {
        Self::new(config.min_degree)
    }
}

impl<T, C: Compare<T>> BTree<T, C> {
    /// Create a new empty B-tree ordered by `compare`
    ///
    /// Rejects `t < 2` and any `t` whose full node of `2t - 1` keys could
    /// not be allocated.
    pub fn with_compare(min_degree: usize, compare: C) -> BTreeResult<Self> {
        if min_degree < MIN_DEGREE_FLOOR || Node::<T>::key_capacity(min_degree).is_none() {
            return Err(BTreeError::InvalidMinDegree(min_degree));
        }

        let mut arena = NodeArena::new();
        let root = arena.allocate(Node::new());
        debug!(min_degree, "created b-tree");

        Ok(Self {
            root,
            min_degree,
            arena,
            compare,
            len: 0,
        })
    }

    /// Get the minimum degree
    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    /// Check if tree holds no keys
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get number of keys in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    /// Get tree height (1 for a single leaf root)
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;

        while let Some(&child) = self.arena.get(current).and_then(|n| n.children.first()) {
            current = child;
            height += 1;
        }

        height
    }

    /// Get the number of live nodes
    pub fn node_count(&self) -> usize {
        self.arena.live_count()
    }

    /// Remove every key, leaving an empty leaf root
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = self.arena.allocate(Node::new());
        self.len = 0;
    }

    // ========== Search Operations ==========

    /// Search for a key, returning the stored element
    pub fn search(&self, key: &T) -> Option<&T> {
        self.search_by(|stored| self.compare.compare(stored, key))
    }

    /// Check if a key is present
    pub fn contains(&self, key: &T) -> bool {
        self.search(key).is_some()
    }

    /// Search with a probe returning the ordering of a stored element
    /// relative to the target
    ///
    /// The probe must agree with the tree's comparator.
    pub fn search_by<F>(&self, probe: F) -> Option<&T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let (id, index) = self.arena.find_by(self.root, probe)?;
        self.arena.get(id)?.keys.get(index)
    }

    /// Mutable variant of [`BTree::search_by`]
    ///
    /// Callers must not change the element's position in the ordering.
    pub fn search_by_mut<F>(&mut self, probe: F) -> Option<&mut T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let (id, index) = self.arena.find_by(self.root, probe)?;
        self.arena.get_mut(id)?.keys.get_mut(index)
    }

    // ========== Insert Operations ==========

    /// Insert a key, returning a reference to the stored element
    ///
    /// Duplicates are not rejected; callers that need unique keys should
    /// [`search`](BTree::search) first.
    pub fn insert(&mut self, key: T) -> BTreeResult<&mut T> {
        if self.arena.node(self.root)?.is_full(self.min_degree) {
            self.grow_root()?;
        }

        let stored = self
            .arena
            .insert(self.root, key, self.min_degree, &self.compare)?;
        self.len += 1;
        Ok(stored)
    }

    /// Put a new root above the full root and split the old one
    fn grow_root(&mut self) -> BTreeResult<()> {
        let old_root = self.root;
        let mut new_root = Node::new();
        new_root.children.push(old_root);

        self.root = self.arena.allocate(new_root);
        self.arena.split_child(self.root, 0, self.min_degree)?;

        debug!(root = self.root, height = self.height(), "tree grew a level");
        Ok(())
    }

    // ========== Delete Operations ==========

    /// Delete a key, returning the removed element
    ///
    /// Deleting an absent key returns `None` and keeps the key set as it
    /// was, though rebalancing on the way down may still reshape nodes and
    /// drop a level.
    pub fn erase(&mut self, key: &T) -> BTreeResult<Option<T>> {
        let compare = &self.compare;
        let mut probe = Probe::Matching(|stored: &T| compare.compare(stored, key));

        let removed = self.arena.erase(self.root, self.min_degree, &mut probe)?;
        self.finish_erase(removed)
    }

    /// Delete with a probe returning the ordering of a stored element
    /// relative to the target
    pub fn erase_by<F>(&mut self, probe: F) -> BTreeResult<Option<T>>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut probe = Probe::Matching(probe);

        let removed = self.arena.erase(self.root, self.min_degree, &mut probe)?;
        self.finish_erase(removed)
    }

    fn finish_erase(&mut self, removed: Option<T>) -> BTreeResult<Option<T>> {
        if removed.is_some() {
            self.len -= 1;
        }

        // Rebalancing may have merged the root's last two children even if
        // the key was absent
        self.shrink_root()?;
        Ok(removed)
    }

    /// Promote the only child of a keyless root
    fn shrink_root(&mut self) -> BTreeResult<()> {
        let root = self.arena.node(self.root)?;
        if !root.keys.is_empty() || root.children.len() != 1 {
            return Ok(());
        }

        let new_root = root.children[0];
        let old_root = self.root;
        self.arena
            .release(old_root)
            .ok_or(BTreeError::NodeNotFound(old_root))?;
        self.root = new_root;

        debug!(root = new_root, height = self.height(), "tree shrank a level");
        Ok(())
    }

    // ========== Diagnostics ==========

    /// Keys of every node, grouped by depth, left to right
    pub fn levels(&self) -> Vec<Vec<&[T]>> {
        let mut levels = Vec::new();
        let mut frontier = vec![self.root];

        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next = Vec::new();

            for id in frontier {
                if let Some(node) = self.arena.get(id) {
                    level.push(node.keys.as_slice());
                    next.extend_from_slice(&node.children);
                }
            }

            levels.push(level);
            frontier = next;
        }

        levels
    }

    /// Verify ordering, occupancy and balance of the whole tree
    ///
    /// Returns the first violation found as [`BTreeError::InvalidState`].
    pub fn check_invariants(&self) -> BTreeResult<()> {
        let mut leaf_depth = None;
        let count = self.check_node(self.root, 0, None, None, &mut leaf_depth)?;

        if count != self.len {
            return Err(BTreeError::InvalidState(format!(
                "len mismatch: len={}, actual count={count}",
                self.len
            )));
        }

        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&T>,
        upper: Option<&T>,
        leaf_depth: &mut Option<usize>,
    ) -> BTreeResult<usize> {
        let node = self.arena.node(id)?;
        let max_keys = 2 * self.min_degree - 1;

        if node.keys.len() > max_keys {
            return Err(BTreeError::InvalidState(format!(
                "node {id} holds {} keys, max is {max_keys}",
                node.keys.len()
            )));
        }
        if id != self.root && node.keys.len() < self.min_degree - 1 {
            return Err(BTreeError::InvalidState(format!(
                "node {id} holds {} keys, min is {}",
                node.keys.len(),
                self.min_degree - 1
            )));
        }
        if node.keys.windows(2).any(|w| self.compare.less(&w[1], &w[0])) {
            return Err(BTreeError::InvalidState(format!("node {id} keys out of order")));
        }

        let out_of_bounds = node.keys.iter().any(|k| {
            lower.is_some_and(|lo| self.compare.less(k, lo))
                || upper.is_some_and(|hi| self.compare.less(hi, k))
        });
        if out_of_bounds {
            return Err(BTreeError::InvalidState(format!(
                "node {id} has a key outside its parent's separators"
            )));
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(BTreeError::InvalidState(format!(
                        "leaf {id} at depth {depth}, expected {expected}"
                    )));
                }
                Some(_) => {}
            }
            return Ok(node.keys.len());
        }

        if node.children.len() != node.keys.len() + 1 {
            return Err(BTreeError::InvalidState(format!(
                "node {id} has {} keys but {} children",
                node.keys.len(),
                node.children.len()
            )));
        }

        let mut count = node.keys.len();
        for (i, &child) in node.children.iter().enumerate() {
            let child_lower = if i == 0 { lower } else { node.keys.get(i - 1) };
            let child_upper = node.keys.get(i).or(upper);
            count += self.check_node(child, depth + 1, child_lower, child_upper, leaf_depth)?;
        }

        Ok(count)
    }

    // ========== Iterator ==========

    /// Iterate over all keys in order
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.arena, self.root, self.len)
    }
}

impl<T: fmt::Display, C: Compare<T>> BTree<T, C> {
    /// Write a depth-first dump of the tree, one node per line,
    /// indented by depth
    pub fn print<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let Some(node) = self.arena.get(id) else {
            return Ok(());
        };

        write!(f, "{:depth$}[", "")?;
        for (i, key) in node.keys.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{key}")?;
        }
        writeln!(f, "]")?;

        for &child in &node.children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl<T: fmt::Display, C: Compare<T>> fmt::Display for BTree<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}

impl<'a, T, C: Compare<T>> IntoIterator for &'a BTree<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over B-tree keys
pub struct Iter<'a, T> {
    arena: &'a NodeArena<T>,
    /// Path from the root: node and index of the next key to yield
    stack: Vec<(NodeId, usize)>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn new(arena: &'a NodeArena<T>, root: NodeId, len: usize) -> Self {
        let mut iter = Self {
            arena,
            stack: Vec::new(),
            remaining: len,
        };
        iter.descend_leftmost(root);
        iter
    }

    fn descend_leftmost(&mut self, mut id: NodeId) {
        let arena = self.arena;
        while let Some(node) = arena.get(id) {
            self.stack.push((id, 0));
            match node.children.first() {
                Some(&child) => id = child,
                None => break,
            }
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let arena = self.arena;
            let (id, index) = *self.stack.last()?;
            let node = arena.get(id)?;

            if let Some(key) = node.keys.get(index) {
                if let Some(top) = self.stack.last_mut() {
                    top.1 += 1;
                }
                if let Some(&child) = node.children.get(index + 1) {
                    self.descend_leftmost(child);
                }
                self.remaining = self.remaining.saturating_sub(1);
                return Some(key);
            }

            self.stack.pop();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
