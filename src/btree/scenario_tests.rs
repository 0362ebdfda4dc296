//! Structural scenarios and property tests for the B-tree

use std::collections::BTreeSet;

use proptest::prelude::*;

use super::*;

/// Keys of every node, grouped by depth
fn shape(tree: &BTree<i32>) -> Vec<Vec<Vec<i32>>> {
    tree.levels()
        .into_iter()
        .map(|level| level.into_iter().map(<[i32]>::to_vec).collect())
        .collect()
}

fn build(min_degree: usize, keys: impl IntoIterator<Item = i32>) -> BTree<i32> {
    let mut tree = BTree::new(min_degree).unwrap();
    for key in keys {
        tree.insert(key).unwrap();
    }
    tree.check_invariants().unwrap();
    tree
}

#[test]
fn test_insert_worked_example() {
    let tree = build(2, [10, 20, 5, 6, 12, 30, 7, 17]);

    assert_eq!(
        shape(&tree),
        vec![
            vec![vec![10, 20]],
            vec![vec![5, 6, 7], vec![12, 17], vec![30]],
        ]
    );
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.len(), 8);
}

#[test]
fn test_insert_splits_root_before_descending() {
    let mut tree = build(2, [10, 20, 5]);
    assert_eq!(shape(&tree), vec![vec![vec![5, 10, 20]]]);

    tree.insert(6).unwrap();

    assert_eq!(
        shape(&tree),
        vec![vec![vec![10]], vec![vec![5, 6], vec![20]]]
    );
}

#[test]
fn test_erase_from_rich_leaf_does_not_merge() {
    let mut tree = build(2, 1..=7);
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2, 4]], vec![vec![1], vec![3], vec![5, 6, 7]]]
    );

    assert_eq!(tree.erase(&6).unwrap(), Some(6));

    // Root keeps both separators and all three children
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2, 4]], vec![vec![1], vec![3], vec![5, 7]]]
    );
    assert_eq!(tree.node_count(), 4);
}

#[test]
fn test_erase_borrows_from_right_sibling() {
    let mut tree = build(2, 1..=7);

    assert_eq!(tree.erase(&3).unwrap(), Some(3));

    // 4 descends into the poor child, 5 rises to replace it
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2, 5]], vec![vec![1], vec![4], vec![6, 7]]]
    );
    assert_eq!(tree.node_count(), 4);
    tree.check_invariants().unwrap();
}

#[test]
fn test_erase_borrows_from_left_sibling() {
    let mut tree = build(2, [1, 2, 3, 4, 5, 0]);
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2]], vec![vec![0, 1], vec![3, 4, 5]]]
    );

    tree.erase(&5).unwrap();
    tree.erase(&4).unwrap();
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2]], vec![vec![0, 1], vec![3]]]
    );

    // Last child is poor and has no right sibling: rotate through the parent
    assert_eq!(tree.erase(&3).unwrap(), Some(3));
    assert_eq!(
        shape(&tree),
        vec![vec![vec![1]], vec![vec![0], vec![2]]]
    );
    tree.check_invariants().unwrap();
}

#[test]
fn test_erase_merges_then_shrinks_root() {
    let mut tree = build(2, 1..=4);
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2]], vec![vec![1], vec![3, 4]]]
    );

    // Left child is poor, right child lends its minimum
    tree.erase(&2).unwrap();
    assert_eq!(
        shape(&tree),
        vec![vec![vec![3]], vec![vec![1], vec![4]]]
    );

    // Both children poor: merge around 3, then the keyless root is dropped
    tree.erase(&3).unwrap();
    assert_eq!(shape(&tree), vec![vec![vec![1, 4]]]);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_erase_merge_with_left_sibling() {
    let mut tree = build(2, 1..=7);
    tree.erase(&6).unwrap();
    tree.erase(&7).unwrap();
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2, 4]], vec![vec![1], vec![3], vec![5]]]
    );

    // Last child and its left sibling are both poor
    assert_eq!(tree.erase(&5).unwrap(), Some(5));
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2]], vec![vec![1], vec![3, 4]]]
    );
}

#[test]
fn test_erase_internal_key_uses_successor() {
    let mut tree = build(2, 1..=7);

    // 4 is a separator; its left child [3] is poor, its right child lends 5
    assert_eq!(tree.erase(&4).unwrap(), Some(4));
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2, 5]], vec![vec![1], vec![3], vec![6, 7]]]
    );
}

#[test]
fn test_erase_absent_key_leaves_tree_intact() {
    let mut tree = build(3, 0..40);

    assert_eq!(tree.erase(&100).unwrap(), None);
    assert_eq!(tree.len(), 40);
    assert_eq!(tree.iter().count(), 40);
    tree.check_invariants().unwrap();

    // Rebalancing on the way down may reshape nodes, never the key set
    let keys: Vec<i32> = tree.iter().copied().collect();
    assert_eq!(keys, (0..40).collect::<Vec<_>>());
}

#[test]
fn test_erase_absent_key_may_drop_a_level() {
    let mut tree = build(2, 1..=4);
    tree.erase(&4).unwrap();
    assert_eq!(
        shape(&tree),
        vec![vec![vec![2]], vec![vec![1], vec![3]]]
    );

    // Last child is poor and so is its left sibling: they merge around 2
    // and the keyless root goes, though 99 was never there
    assert_eq!(tree.erase(&99).unwrap(), None);
    assert_eq!(shape(&tree), vec![vec![vec![1, 2, 3]]]);
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.height(), 1);
    tree.check_invariants().unwrap();
}

#[test]
fn test_search_empty_tree() {
    let tree: BTree<i32> = BTree::new(2).unwrap();

    assert_eq!(tree.search(&0), None);
    assert_eq!(tree.search(&i32::MAX), None);
    assert!(!tree.contains(&-1));
}

#[test]
fn test_erase_empty_tree() {
    let mut tree: BTree<i32> = BTree::new(2).unwrap();

    assert_eq!(tree.erase(&1).unwrap(), None);
    assert!(tree.is_empty());
    assert_eq!(shape(&tree), vec![vec![Vec::<i32>::new()]]);
}

#[test]
fn test_large_tree() {
    let mut tree = BTree::new(4).unwrap();

    for i in (0..1000).rev() {
        tree.insert(i).unwrap();
    }

    assert_eq!(tree.len(), 1000);
    assert!(tree.height() >= 3);
    tree.check_invariants().unwrap();

    for i in (0..1000).step_by(2) {
        tree.erase(&i).unwrap();
    }

    assert_eq!(tree.len(), 500);
    tree.check_invariants().unwrap();
    for i in 0..1000 {
        assert_eq!(tree.contains(&i), i % 2 == 1, "key {i}");
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(i32),
    Erase(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i32..200).prop_map(Op::Insert),
        (0i32..200).prop_map(Op::Erase),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tree_matches_model(min_degree in 2usize..6, ops in prop::collection::vec(op_strategy(), 0..400)) {
        let mut tree = BTree::new(min_degree).unwrap();
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(key) => {
                    // Unique keys are the caller's responsibility
                    if model.insert(key) {
                        prop_assert_eq!(*tree.insert(key).unwrap(), key);
                    }
                }
                Op::Erase(key) => {
                    let expected = model.remove(&key).then_some(key);
                    prop_assert_eq!(tree.erase(&key).unwrap(), expected);
                }
            }
            prop_assert!(tree.check_invariants().is_ok(), "{:?}", tree.check_invariants());
        }

        prop_assert_eq!(tree.len(), model.len());
        let keys: Vec<i32> = tree.iter().copied().collect();
        let expected: Vec<i32> = model.iter().copied().collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn insert_then_search_round_trip(min_degree in 2usize..5, keys in prop::collection::btree_set(any::<i32>(), 1..200)) {
        let mut tree = BTree::new(min_degree).unwrap();

        for &key in &keys {
            prop_assert!(tree.search(&key).is_none());
            tree.insert(key).unwrap();
            prop_assert_eq!(tree.search(&key), Some(&key));
        }
        for &key in &keys {
            tree.erase(&key).unwrap();
            prop_assert!(tree.search(&key).is_none());
        }
    }

    #[test]
    fn erasing_everything_leaves_empty_leaf_root(
        min_degree in 2usize..5,
        order in Just((0i32..150).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let mut tree = BTree::new(min_degree).unwrap();
        for key in 0..150 {
            tree.insert(key).unwrap();
        }

        for key in order {
            prop_assert_eq!(tree.erase(&key).unwrap(), Some(key));
        }

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.height(), 1);
        prop_assert_eq!(tree.node_count(), 1);
        let root = tree.arena.get(tree.root).unwrap();
        prop_assert!(root.is_leaf() && root.keys.is_empty());
    }
}
