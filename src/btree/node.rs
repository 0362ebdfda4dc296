use std::cmp::Ordering;
use std::mem;

/// Node identifier (index into node storage)
pub type NodeId = usize;

/// B-tree node
///
/// A node is a leaf iff it has no children. Internal nodes always hold
/// exactly `keys.len() + 1` children, and every key of `children[i]` sorts
/// at or before `keys[i]`, which sorts at or before every key of `children[i + 1]`.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    /// Keys (sorted)
    pub keys: Vec<T>,
    /// Child node IDs, empty for leaves
    pub children: Vec<NodeId>,
}

impl<T> Node<T> {
    /// Create a new empty leaf
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Most keys a node may hold for the given minimum degree
    ///
    /// `None` when `2t - 1` keys of `T` could never be allocated.
    pub fn key_capacity(min_degree: usize) -> Option<usize> {
        let max_keys = min_degree.checked_mul(2)?.checked_sub(1)?;
        let bytes = max_keys.checked_mul(mem::size_of::<T>())?;
        (bytes <= isize::MAX as usize).then_some(max_keys)
    }

    /// Create a node from its parts
    pub fn from_parts(keys: Vec<T>, children: Vec<NodeId>) -> Self {
        debug_assert!(children.is_empty() || children.len() == keys.len() + 1);
        Self { keys, children }
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// A full node holds `2t - 1` keys and must be split before insertion
    pub fn is_full(&self, min_degree: usize) -> bool {
        self.keys.len() >= 2 * min_degree - 1
    }

    /// A node can give up a key without dropping below `t - 1`
    pub fn can_lend(&self, min_degree: usize) -> bool {
        self.keys.len() >= min_degree
    }

    /// Resolve a probe against this node's keys
    pub(crate) fn locate<F>(&self, probe: &mut Probe<F>) -> Slot
    where
        F: FnMut(&T) -> Ordering,
    {
        match probe {
            Probe::Matching(f) => match self.keys.binary_search_by(|k| f(k)) {
                Ok(i) => Slot::Found(i),
                Err(_) if self.is_leaf() => Slot::Absent,
                Err(i) => Slot::Descend(i),
            },
            Probe::Max => {
                if !self.is_leaf() {
                    Slot::Descend(self.children.len() - 1)
                } else if self.keys.is_empty() {
                    Slot::Absent
                } else {
                    Slot::Found(self.keys.len() - 1)
                }
            }
            Probe::Min => {
                if !self.is_leaf() {
                    Slot::Descend(0)
                } else if self.keys.is_empty() {
                    Slot::Absent
                } else {
                    Slot::Found(0)
                }
            }
        }
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// What an erase is looking for
///
/// `Matching` carries a function returning the ordering of a stored key
/// relative to the target. `Max` and `Min` pull the extreme key of a subtree,
/// which is how predecessors and successors are removed.
pub(crate) enum Probe<F> {
    Matching(F),
    Max,
    Min,
}

/// Outcome of resolving a probe against a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Key is at this index
    Found(usize),
    /// Key, if present, lives under this child
    Descend(usize),
    /// Leaf without the key
    Absent,
}
