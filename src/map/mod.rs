//! Ordered associative map backed by the B-tree
//!
//! Entries are stored as `(key, value)` pairs ordered by key alone, so a
//! lookup never needs a value to compare against.

use std::borrow::Borrow;

use crate::btree::{BTree, BTreeError, BTreeResult, Compare};
use crate::config::TreeConfig;

/// Orders `(key, value)` entries by key
#[derive(Debug, Clone, Copy, Default)]
pub struct ByKey;

impl<K: Ord, V> Compare<(K, V)> for ByKey {
    fn less(&self, a: &(K, V), b: &(K, V)) -> bool {
        a.0 < b.0
    }
}

/// Map with unique, ordered keys
#[derive(Debug)]
pub struct OrderedMap<K, V> {
    tree: BTree<(K, V), ByKey>,
}

impl<K: Ord, V> OrderedMap<K, V> {
    /// Create an empty map whose tree has the given minimum degree
    pub fn new(min_degree: usize) -> BTreeResult<Self> {
        Ok(Self {
            tree: BTree::with_compare(min_degree, ByKey)?,
        })
    }

    /// Create an empty map whose non-root nodes hold at least `min_keys` entries
    pub fn with_min_bucket(min_keys: usize) -> BTreeResult<Self> {
        Self::new(min_keys + 1)
    }

    pub fn from_config(config: &TreeConfig) -> BTreeResult<Self> {
        Self::new(config.min_degree)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Underlying tree, for diagnostics
    pub fn tree(&self) -> &BTree<(K, V), ByKey> {
        &self.tree
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .search_by(|(k, _)| key.cmp(k.borrow()).reverse())
            .map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .search_by_mut(|(k, _)| key.cmp(k.borrow()).reverse())
            .map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Insert a value, returning the previous value for the key
    pub fn insert(&mut self, key: K, value: V) -> BTreeResult<Option<V>> {
        if let Some(slot) = self.get_mut(&key) {
            return Ok(Some(std::mem::replace(slot, value)));
        }

        self.tree.insert((key, value))?;
        Ok(None)
    }

    /// Get the value for `key`, inserting `default()` first if it is absent
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> BTreeResult<&mut V>
    where
        F: FnOnce() -> V,
    {
        if !self.contains_key(&key) {
            let (_, value) = self.tree.insert((key, default()))?;
            return Ok(value);
        }

        self.tree
            .search_by_mut(|(k, _)| k.cmp(&key))
            .map(|(_, v)| v)
            .ok_or_else(|| BTreeError::InvalidState("entry vanished after lookup".to_string()))
    }

    /// Get the value for `key`, inserting `V::default()` first if it is absent
    pub fn get_or_default(&mut self, key: K) -> BTreeResult<&mut V>
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Remove a key, returning its value
    pub fn remove<Q>(&mut self, key: &Q) -> BTreeResult<Option<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let removed = self.tree.erase_by(|(k, _)| key.cmp(k.borrow()).reverse())?;
        Ok(removed.map(|(_, v)| v))
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.tree.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.tree.iter().map(|(_, v)| v)
    }
}

impl<K: Ord, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            tree: BTree::with_compare(crate::config::DEFAULT_MIN_DEGREE, ByKey)
                .expect("Default min degree is valid"),
        }
    }
}
