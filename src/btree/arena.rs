//! Node storage and the node-level tree algorithms
//!
//! Nodes are addressed by [`NodeId`]. Each node is referenced by exactly one
//! parent (or by the tree as its root), so a slot is released only when the
//! node it holds has been merged away or the tree is cleared.

use std::cmp::Ordering;

use tracing::trace;

use super::compare::Compare;
use super::error::{BTreeError, BTreeResult};
use super::node::{Node, NodeId, Probe, Slot};

/// Probe type used when pulling a predecessor or successor
type Extreme<T> = fn(&T) -> Ordering;

#[derive(Debug)]
pub(crate) struct NodeArena<T> {
    /// Node storage
    nodes: Vec<Option<Node<T>>>,

    /// Free list for recycling released slots
    free_list: Vec<NodeId>,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
        }
    }

    // ========== Slot Management ==========

    /// Store a node, returning its ID
    pub fn allocate(&mut self, node: Node<T>) -> NodeId {
        if let Some(id) = self.free_list.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            let id = self.nodes.len();
            self.nodes.push(Some(node));
            id
        }
    }

    /// Detach a node from its slot and recycle the slot
    ///
    /// The returned node still lists its child IDs; those children stay
    /// allocated and belong to whoever takes them over.
    pub fn release(&mut self, id: NodeId) -> Option<Node<T>> {
        let node = self.nodes.get_mut(id)?.take()?;
        self.free_list.push(id);
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(id).and_then(|n| n.as_mut())
    }

    pub fn node(&self, id: NodeId) -> BTreeResult<&Node<T>> {
        self.get(id).ok_or(BTreeError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> BTreeResult<&mut Node<T>> {
        self.get_mut(id).ok_or(BTreeError::NodeNotFound(id))
    }

    /// Number of live nodes
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
    }

    fn child_id(&self, parent: NodeId, index: usize) -> BTreeResult<NodeId> {
        self.node(parent)?
            .children
            .get(index)
            .copied()
            .ok_or_else(|| {
                BTreeError::InvalidState(format!("node {parent} has no child {index}"))
            })
    }

    // ========== Structural Primitives ==========

    /// Split the full child at `index` of `parent`
    ///
    /// The child keeps its lower `t - 1` keys, a new right sibling takes the
    /// upper `t - 1` keys (and upper `t` children), and the median moves up
    /// into `parent` at `index`.
    pub fn split_child(
        &mut self,
        parent: NodeId,
        index: usize,
        min_degree: usize,
    ) -> BTreeResult<NodeId> {
        let child_id = self.child_id(parent, index)?;

        let (median, right) = {
            let child = self.node_mut(child_id)?;
            if child.keys.len() != 2 * min_degree - 1 {
                return Err(BTreeError::InvalidState(format!(
                    "split of node {child_id} with {} keys",
                    child.keys.len()
                )));
            }

            let right_keys = child.keys.split_off(min_degree);
            let right_children = if child.is_leaf() {
                Vec::new()
            } else {
                child.children.split_off(min_degree)
            };
            let median = child.keys.pop().ok_or(BTreeError::NodeNotFound(child_id))?;

            (median, Node::from_parts(right_keys, right_children))
        };

        let right_id = self.allocate(right);

        let parent_node = self.node_mut(parent)?;
        parent_node.keys.insert(index, median);
        parent_node.children.insert(index + 1, right_id);

        trace!(parent, index, left = child_id, right = right_id, "split child");
        Ok(right_id)
    }

    /// Merge child `index + 1` of `parent` into child `index`
    ///
    /// The separator `keys[index]` descends as the median of the merged node.
    pub fn merge_right_left(&mut self, parent: NodeId, index: usize) -> BTreeResult<NodeId> {
        let left_id = self.child_id(parent, index)?;
        let right_id = self.child_id(parent, index + 1)?;

        let separator = {
            let parent_node = self.node_mut(parent)?;
            if index >= parent_node.keys.len() {
                return Err(BTreeError::InvalidState(format!(
                    "node {parent} has no separator {index}"
                )));
            }
            parent_node.children.remove(index + 1);
            parent_node.keys.remove(index)
        };

        // Detach the right node first so its children move instead of dropping
        let right = self
            .release(right_id)
            .ok_or(BTreeError::NodeNotFound(right_id))?;

        let left = self.node_mut(left_id)?;
        left.keys.push(separator);
        left.keys.extend(right.keys);
        left.children.extend(right.children);

        trace!(parent, index, left = left_id, right = right_id, "merged children");
        Ok(left_id)
    }

    /// Rotate one key from child `index + 1` through the parent into child `index`
    pub fn borrow_from_right(&mut self, parent: NodeId, index: usize) -> BTreeResult<()> {
        let child_id = self.child_id(parent, index)?;
        let sibling_id = self.child_id(parent, index + 1)?;

        let (promoted, moved_child) = {
            let sibling = self.node_mut(sibling_id)?;
            if sibling.keys.is_empty() {
                return Err(BTreeError::InvalidState(format!(
                    "borrow from empty node {sibling_id}"
                )));
            }
            let moved_child = if sibling.is_leaf() {
                None
            } else {
                Some(sibling.children.remove(0))
            };
            (sibling.keys.remove(0), moved_child)
        };

        let separator = {
            let slot = self.node_mut(parent)?.keys.get_mut(index).ok_or_else(|| {
                BTreeError::InvalidState(format!("node {parent} has no separator {index}"))
            })?;
            std::mem::replace(slot, promoted)
        };

        let child = self.node_mut(child_id)?;
        child.keys.push(separator);
        if let Some(moved) = moved_child {
            child.children.push(moved);
        }

        trace!(parent, index, from = sibling_id, "borrowed from right sibling");
        Ok(())
    }

    /// Rotate one key from child `index - 1` through the parent into child `index`
    pub fn borrow_from_left(&mut self, parent: NodeId, index: usize) -> BTreeResult<()> {
        let separator_index = index.checked_sub(1).ok_or_else(|| {
            BTreeError::InvalidState(format!("child 0 of node {parent} has no left sibling"))
        })?;
        let child_id = self.child_id(parent, index)?;
        let sibling_id = self.child_id(parent, separator_index)?;

        let (promoted, moved_child) = {
            let sibling = self.node_mut(sibling_id)?;
            let promoted = sibling.keys.pop().ok_or_else(|| {
                BTreeError::InvalidState(format!("borrow from empty node {sibling_id}"))
            })?;
            (promoted, sibling.children.pop())
        };

        let separator = {
            let slot = self
                .node_mut(parent)?
                .keys
                .get_mut(separator_index)
                .ok_or_else(|| {
                    BTreeError::InvalidState(format!(
                        "node {parent} has no separator {separator_index}"
                    ))
                })?;
            std::mem::replace(slot, promoted)
        };

        let child = self.node_mut(child_id)?;
        child.keys.insert(0, separator);
        if let Some(moved) = moved_child {
            child.children.insert(0, moved);
        }

        trace!(parent, index, from = sibling_id, "borrowed from left sibling");
        Ok(())
    }

    // ========== Search ==========

    /// Locate the node and index of the key matching `probe`
    pub fn find_by<F>(&self, root: NodeId, mut probe: F) -> Option<(NodeId, usize)>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut current = root;

        loop {
            let node = self.get(current)?;
            match node.keys.binary_search_by(&mut probe) {
                Ok(i) => return Some((current, i)),
                Err(_) if node.is_leaf() => return None,
                Err(i) => current = *node.children.get(i)?,
            }
        }
    }

    // ========== Insert ==========

    /// Insert `key` below `id`, which must not be full
    ///
    /// Full children are split on the way down, so every node the descent
    /// enters has room for a key promoted out of its child.
    pub fn insert<C>(
        &mut self,
        id: NodeId,
        key: T,
        min_degree: usize,
        compare: &C,
    ) -> BTreeResult<&mut T>
    where
        C: Compare<T>,
    {
        let mut current = id;

        loop {
            let (mut index, child) = {
                let node = self.node(current)?;
                // Upper bound: equal keys are stored after existing ones
                let index = node.keys.partition_point(|k| !compare.less(&key, k));
                (index, node.children.get(index).copied())
            };

            let Some(child) = child else {
                let leaf = self.node_mut(current)?;
                leaf.keys.insert(index, key);
                return leaf.keys.get_mut(index).ok_or_else(|| {
                    BTreeError::InvalidState(format!("insert position {index} lost"))
                });
            };

            if self.node(child)?.is_full(min_degree) {
                self.split_child(current, index, min_degree)?;

                let separator = self.node(current)?.keys.get(index).ok_or_else(|| {
                    BTreeError::InvalidState(format!("split of node {child} promoted nothing"))
                })?;
                if !compare.less(&key, separator) {
                    index += 1;
                }
            }

            current = self.child_id(current, index)?;
        }
    }

    // ========== Erase ==========

    /// Remove the key matching `probe` from the subtree rooted at `id`
    ///
    /// Every node the recursion enters, other than the root, holds at least
    /// `t` keys, so removing one key from it never underflows.
    pub(crate) fn erase<F>(
        &mut self,
        id: NodeId,
        min_degree: usize,
        probe: &mut Probe<F>,
    ) -> BTreeResult<Option<T>>
    where
        F: FnMut(&T) -> Ordering,
    {
        let (slot, is_leaf) = {
            let node = self.node(id)?;
            (node.locate(probe), node.is_leaf())
        };

        match slot {
            Slot::Absent => Ok(None),
            Slot::Found(index) if is_leaf => Ok(Some(self.node_mut(id)?.keys.remove(index))),
            Slot::Found(index) => self.erase_separator(id, index, min_degree, probe),
            Slot::Descend(index) => {
                let index = self.fill_child(id, index, min_degree)?;
                let child = self.child_id(id, index)?;
                self.erase(child, min_degree, probe)
            }
        }
    }

    /// Remove `keys[index]` of internal node `id`
    fn erase_separator<F>(
        &mut self,
        id: NodeId,
        index: usize,
        min_degree: usize,
        probe: &mut Probe<F>,
    ) -> BTreeResult<Option<T>>
    where
        F: FnMut(&T) -> Ordering,
    {
        let left = self.child_id(id, index)?;
        let right = self.child_id(id, index + 1)?;

        let replacement = if self.node(left)?.can_lend(min_degree) {
            self.erase(left, min_degree, &mut Probe::<Extreme<T>>::Max)?
        } else if self.node(right)?.can_lend(min_degree) {
            self.erase(right, min_degree, &mut Probe::<Extreme<T>>::Min)?
        } else {
            let merged = self.merge_right_left(id, index)?;
            return self.erase(merged, min_degree, probe);
        };

        let replacement = replacement.ok_or_else(|| {
            BTreeError::InvalidState(format!("empty subtree under node {id}"))
        })?;
        let slot = self.node_mut(id)?.keys.get_mut(index).ok_or_else(|| {
            BTreeError::InvalidState(format!("node {id} has no key {index}"))
        })?;
        Ok(Some(std::mem::replace(slot, replacement)))
    }

    /// Make sure child `index` of `id` holds at least `t` keys before descending
    ///
    /// Returns the index of the child to descend into, which moves left by
    /// one when the child had to merge into its left sibling.
    fn fill_child(&mut self, id: NodeId, index: usize, min_degree: usize) -> BTreeResult<usize> {
        if self.node(self.child_id(id, index)?)?.can_lend(min_degree) {
            return Ok(index);
        }

        let key_count = self.node(id)?.keys.len();
        let right_can_lend = index < key_count
            && self
                .node(self.child_id(id, index + 1)?)?
                .can_lend(min_degree);
        let left_can_lend =
            index > 0 && self.node(self.child_id(id, index - 1)?)?.can_lend(min_degree);

        if right_can_lend {
            self.borrow_from_right(id, index)?;
            Ok(index)
        } else if left_can_lend {
            self.borrow_from_left(id, index)?;
            Ok(index)
        } else if index < key_count {
            self.merge_right_left(id, index)?;
            Ok(index)
        } else if index > 0 {
            self.merge_right_left(id, index - 1)?;
            Ok(index - 1)
        } else {
            Err(BTreeError::InvalidState(format!(
                "internal node {id} has no keys"
            )))
        }
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
