use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Walk the whole tree and the free list and check every structural
/// invariant. Returns the subtree height so it can recurse.
fn check_subtree<T, C: Comparator<T>, A: SlotAllocator>(
    t: &AvlTree<T, C, A>,
    node: u32,
    reachable: &mut HashSet<u32>,
) -> i32 {
    if node == NONE {
        return 0;
    }
    assert!(
        t.arena.get(node).is_some(),
        "reachable node {node} must be live"
    );
    assert!(reachable.insert(node), "node {node} reachable twice");

    let left = t.arena.left(node);
    let right = t.arena.right(node);
    let lh = check_subtree(t, left, reachable);
    let rh = check_subtree(t, right, reachable);
    let balance = t.arena.balance(node);
    assert_eq!(
        i32::from(balance),
        rh - lh,
        "stored balance of node {node} must equal height difference"
    );
    assert!((-1..=1).contains(&balance), "node {node} out of balance");

    let value = t.arena.value(node);
    if left != NONE {
        assert_eq!(
            t.comparator.compare(t.arena.value(left), value),
            Ordering::Less,
            "left child must sort before its parent"
        );
    }
    if right != NONE {
        assert_eq!(
            t.comparator.compare(t.arena.value(right), value),
            Ordering::Greater,
            "right child must sort after its parent"
        );
    }
    1 + lh.max(rh)
}

pub(crate) fn validate_tree<T, C: Comparator<T>, A: SlotAllocator>(t: &AvlTree<T, C, A>) {
    assert_eq!(t.root == NONE, t.len == 0, "root must be NONE iff empty");

    let mut reachable = HashSet::new();
    let height = check_subtree(t, t.root, &mut reachable);
    assert_eq!(reachable.len(), t.len, "reachable node count must match len");
    assert_eq!(t.height(), height as usize, "balance-guided height must match");

    // In-order walk is strictly ascending under the comparator.
    let ordered: Vec<&T> = t.iter().collect();
    assert_eq!(ordered.len(), t.len);
    for pair in ordered.windows(2) {
        assert_eq!(t.comparator.compare(pair[0], pair[1]), Ordering::Less);
    }

    // Live and free slots partition the arena.
    let free = t.arena.free_list();
    assert_eq!(free.len(), t.arena.free_len(), "free list length");
    for index in &free {
        assert!(!reachable.contains(index), "slot {index} both live and free");
    }
    assert_eq!(reachable.len() + free.len(), t.capacity(), "slots must partition");
    assert_eq!(t.arena.len(), t.len);
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 50)]
    Insert(u8),
    #[proptest(weight = 30)]
    Remove(u8),
    #[proptest(weight = 19)]
    Find(u8),
    #[proptest(weight = 1)]
    Clear,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=600)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_btreeset(ops in ops_strategy()) {
        let mut t: AvlTree<u8> = AvlTree::new();
        let mut m: BTreeSet<u8> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    prop_assert_eq!(t.insert(v), m.insert(v));
                }
                Op::Remove(v) => {
                    let expected = if m.remove(&v) { Some(v) } else { None };
                    prop_assert_eq!(t.remove(&v), expected);
                    prop_assert_eq!(t.find(&v), t.end());
                }
                Op::Find(v) => {
                    let pos = t.find(&v);
                    prop_assert_eq!(t.get(pos).copied(), m.get(&v).copied());
                }
                Op::Clear => {
                    t.clear();
                    m.clear();
                }
            }

            prop_assert_eq!(t.len(), m.len());
            validate_tree(&t);
        }

        let got: Vec<u8> = t.iter().copied().collect();
        let expected: Vec<u8> = m.iter().copied().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(t.first(), m.first());
        prop_assert_eq!(t.last(), m.last());
    }

    /// Values that share a bucket compare equal: the first one inserted
    /// stays, later ones are dropped, and any member of the bucket finds or
    /// removes it.
    #[test]
    fn prop_weak_comparator_buckets(ops in ops_strategy()) {
        let by_bucket = |a: &u8, b: &u8| (a / 8).cmp(&(b / 8));
        let mut t: AvlTree<u8, _> = AvlTree::with_comparator(by_bucket);
        let mut m: BTreeMap<u8, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let fresh = !m.contains_key(&(v / 8));
                    if fresh {
                        m.insert(v / 8, v);
                    }
                    prop_assert_eq!(t.insert(v), fresh);
                }
                Op::Remove(v) => {
                    prop_assert_eq!(t.remove(&v), m.remove(&(v / 8)));
                }
                Op::Find(v) => {
                    let pos = t.find(&v);
                    prop_assert_eq!(t.get(pos), m.get(&(v / 8)));
                }
                Op::Clear => {
                    t.clear();
                    m.clear();
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<u8> = t.iter().copied().collect();
        let expected: Vec<u8> = m.values().copied().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_round_trip_subset(
        values in prop::collection::btree_set(any::<u32>(), 1..400),
        mask in prop::collection::vec(any::<bool>(), 400),
    ) {
        let values: Vec<u32> = values.into_iter().collect();
        let mut t: AvlTree<u32> = values.iter().copied().collect();
        let subset: Vec<u32> = values
            .iter()
            .zip(&mask)
            .filter(|&(_, &keep)| keep)
            .map(|(&v, _)| v)
            .collect();

        for v in &subset {
            prop_assert_eq!(t.remove(v), Some(*v));
        }
        prop_assert_eq!(t.len(), values.len() - subset.len());
        validate_tree(&t);

        for v in &subset {
            prop_assert!(t.insert(*v));
        }
        validate_tree(&t);
        let got: Vec<u32> = t.iter().copied().collect();
        prop_assert_eq!(got, values);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u32> = (1..=7).collect();

    for_each_permutation(&keys, |perm| {
        let mut t: AvlTree<u32> = AvlTree::new();
        for k in perm {
            assert!(t.insert(k));
            validate_tree(&t);
        }
        let got: Vec<u32> = t.iter().copied().collect();
        assert_eq!(got, keys);
        // Seven nodes fit in height 3, or 4 for the sparsest shape.
        assert!(t.height() <= 4);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u32> = (1..=7).collect();

    // Insert in a fixed order, then remove in all permutations.
    let mut base_tree: AvlTree<u32> = AvlTree::new();
    for k in [4, 2, 6, 1, 3, 5, 7] {
        base_tree.insert(k);
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base_tree.clone();
        let mut remaining: BTreeSet<u32> = keys.iter().copied().collect();

        for k in perm {
            assert_eq!(t.remove(&k), Some(k));
            remaining.remove(&k);
            assert_eq!(t.len(), remaining.len());
            validate_tree(&t);
            let got: Vec<u32> = t.iter().copied().collect();
            let expected: Vec<u32> = remaining.iter().copied().collect();
            assert_eq!(got, expected);
        }
        assert_eq!(t.len(), 0);
        assert_eq!(t.root, NONE);
        assert_eq!(t.arena.free_len(), t.capacity());
    });
}

/// Remove from a Fibonacci-shaped (sparsest) tree, where removals cascade
/// rotations all the way to the root.
#[test]
fn exhaustive_remove_from_sparse_tree() {
    // Inserting in this order builds a 12-node tree of height 5 without
    // triggering any rotation; every inner node leans left.
    let mut base_tree: AvlTree<u32> = AvlTree::new();
    for k in [8, 5, 11, 3, 7, 10, 12, 9, 6, 2, 4, 1] {
        base_tree.insert(k);
    }
    validate_tree(&base_tree);
    assert_eq!(base_tree.height(), 5);
    assert_eq!(base_tree.arena.balance(base_tree.root), -1);

    let keys: Vec<u32> = base_tree.iter().copied().collect();
    for &k in &keys {
        let mut t = base_tree.clone();
        assert_eq!(t.remove(&k), Some(k));
        validate_tree(&t);
        assert!(t.height() <= 5);
    }
}
