use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Checks every structural invariant the tree promises to uphold after each
/// public mutating operation.
fn validate_tree<K: Ord + Clone + std::fmt::Debug, V>(t: &RbTree<K, V>) {
    assert_eq!(
        t.nodes.live(),
        t.count,
        "live arena slots must track element count"
    );

    if t.root.is_nil() {
        assert_eq!(t.count, 0, "empty tree must have count 0");
        return;
    }

    assert_eq!(t.color(t.root), Color::Black, "root must be black");
    assert!(
        t.nodes.get(t.root).parent.is_nil(),
        "root must have no parent"
    );

    // Parent links, red-red edges, and reachable count.
    let mut reachable = 0usize;
    let mut stack: Vec<Idx> = vec![t.root];
    while let Some(idx) = stack.pop() {
        reachable += 1;
        let node = t.nodes.get(idx);

        if node.color == Color::Red {
            assert_eq!(t.color(node.left), Color::Black, "red node with red left child");
            assert_eq!(t.color(node.right), Color::Black, "red node with red right child");
        }

        for child in [node.left, node.right] {
            if !child.is_nil() {
                assert_eq!(
                    t.nodes.get(child).parent,
                    idx,
                    "child's parent link must point back"
                );
                stack.push(child);
            }
        }
    }
    assert_eq!(reachable, t.len(), "reachable nodes must match len");

    // Equal black count on every path to an absent child.
    fn black_height<K, V>(t: &RbTree<K, V>, idx: Idx) -> usize {
        if idx.is_nil() {
            return 1;
        }
        let node = t.nodes.get(idx);
        let lh = black_height(t, node.left);
        let rh = black_height(t, node.right);
        assert_eq!(lh, rh, "black-height mismatch between subtrees");
        lh + usize::from(node.color == Color::Black)
    }
    black_height(t, t.root);

    // Strict in-order key ordering.
    let keys: Vec<K> = t.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys.len(), t.len());
    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "in-order keys must strictly increase");
    }

    // Balance bound implied by the color invariants.
    let bound = (2.0 * ((t.len() as f64) + 1.0).log2()).floor() as usize;
    assert!(
        t.height() <= bound,
        "height {} exceeds red-black bound {} for {} nodes",
        t.height(),
        bound,
        t.len()
    );
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, u64),
    Remove(u16),
    Get(u16),
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    // Narrow key space so duplicate inserts and hit/miss removes are common.
    let key = 0u16..256;
    let op = prop_oneof![
        50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        25 => key.clone().prop_map(Op::Remove),
        25 => key.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=max_len)
}

fn apply(t: &mut RbTree<u16, u64>, m: &mut BTreeMap<u16, u64>, op: Op) {
    match op {
        Op::Insert(key, value) => {
            // Duplicates are rejected, so the model only advances when the
            // key is new.
            let expect_new = !m.contains_key(&key);
            assert_eq!(t.insert(key, value), expect_new);
            if expect_new {
                m.insert(key, value);
            }
        }
        Op::Remove(key) => {
            assert_eq!(t.remove(&key), m.remove(&key));
        }
        Op::Get(key) => {
            assert_eq!(t.get(&key), m.get(&key));
        }
    }
    assert_eq!(t.len(), m.len());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_btreemap(ops in ops_strategy(2000)) {
        let mut t: RbTree<u16, u64> = RbTree::new();
        let mut m: BTreeMap<u16, u64> = BTreeMap::new();

        for op in ops {
            apply(&mut t, &mut m, op);
        }

        validate_tree(&t);
        let got: Vec<(u16, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u64)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_invariants_after_every_op(ops in ops_strategy(200)) {
        let mut t: RbTree<u16, u64> = RbTree::new();
        let mut m: BTreeMap<u16, u64> = BTreeMap::new();

        for op in ops {
            apply(&mut t, &mut m, op);
            validate_tree(&t);
        }
    }

    #[test]
    fn prop_clone_matches_and_detaches(ops in ops_strategy(500)) {
        let mut t: RbTree<u16, u64> = RbTree::new();
        let mut m: BTreeMap<u16, u64> = BTreeMap::new();
        for op in ops {
            apply(&mut t, &mut m, op);
        }

        let mut t2 = t.clone();
        validate_tree(&t2);
        let a: Vec<(u16, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let b: Vec<(u16, u64)> = t2.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&a, &b);

        // Draining the copy leaves the original intact.
        let keys: Vec<u16> = b.iter().map(|(k, _)| *k).collect();
        for k in keys {
            t2.remove(&k);
        }
        prop_assert_eq!(t2.len(), 0);
        let after: Vec<(u16, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(after, a);
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
    let keys: Vec<u32> = vec![1, 2, 3, 4, 5, 6];

    for_each_permutation(&keys, |perm| {
        let mut t: RbTree<u32, u32> = RbTree::new();
        for (i, k) in perm.into_iter().enumerate() {
            assert!(t.insert(k, i as u32));
            validate_tree(&t);
        }
        assert_eq!(t.len(), keys.len());

        let got: Vec<u32> = t.iter().map(|(k, _)| *k).collect();
        assert_eq!(got, keys);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u32> = vec![1, 2, 3, 4, 5, 6];

    // Insert in a fixed order, then remove in all permutations.
    let mut base: RbTree<u32, u32> = RbTree::new();
    for (i, k) in keys.iter().enumerate() {
        assert!(base.insert(*k, i as u32));
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        for k in perm {
            assert!(t.remove(&k).is_some());
            validate_tree(&t);
        }
        assert_eq!(t.len(), 0);
        assert!(t.root.is_nil());
    });
}
