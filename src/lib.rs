//! # rbt-rs
//!
//! An ordered map backed by a classic red-black tree.
//!
//! Insertion, removal, and lookup are guaranteed O(log n): the tree maintains
//! the textbook red-black invariants (black root, no red node with a red
//! child, equal black count on every root-to-leaf path) via recolor/rotate
//! fixups after every structural change.
//!
//! Duplicate keys are rejected rather than overwritten, so a stored value can
//! only change through [`RbTree::get_mut`] — which is the intended pattern
//! for callers that find-and-edit records in place (e.g. a keyed inventory
//! store updating a price or stock count).
//!
//! ## Example
//!
//! ```rust
//! use rbt_rs::RbTree;
//!
//! let mut tree: RbTree<u32, &str> = RbTree::new();
//! assert!(tree.insert(2, "two"));
//! assert!(tree.insert(1, "one"));
//! assert!(!tree.insert(1, "uno")); // duplicate: rejected, "one" kept
//!
//! assert_eq!(tree.get(&1), Some(&"one"));
//! assert_eq!(tree.len(), 2);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

use std::cmp::Ordering;

// =============================================================================
// Slot index
// =============================================================================

/// Index of a node slot in the arena.
///
/// `NIL` stands for an absent child (or the root's absent parent). Absent
/// positions are implicitly black for the purposes of the color invariants.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Idx(u32);

impl Idx {
    const NIL: Idx = Idx(u32::MAX);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn usize(self) -> usize {
        debug_assert!(!self.is_nil());
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

// =============================================================================
// Node arena
// =============================================================================

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    parent: Idx,
    left: Idx,
    right: Idx,
}

/// Slot arena for tree nodes, with a free list of removed slots.
///
/// Parent/child relations are stored as `Idx` values into `slots`, never as
/// references, so the cyclic parent links need no ownership gymnastics. A
/// removed node's slot is `take`n (dropping its key/value immediately) and
/// pushed onto the free list for reuse by a later insert.
#[derive(Clone)]
struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<Idx>,
}

impl<K, V> NodeArena<K, V> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    #[inline]
    fn get(&self, idx: Idx) -> &Node<K, V> {
        self.slots[idx.usize()].as_ref().expect("stale node index")
    }

    #[inline]
    fn get_mut(&mut self, idx: Idx) -> &mut Node<K, V> {
        self.slots[idx.usize()].as_mut().expect("stale node index")
    }

    fn alloc(&mut self, node: Node<K, V>) -> Idx {
        if let Some(idx) = self.free.pop() {
            debug_assert!(self.slots[idx.usize()].is_none());
            self.slots[idx.usize()] = Some(node);
            return idx;
        }
        let idx = Idx(self.slots.len() as u32);
        assert!(!idx.is_nil(), "node arena full");
        self.slots.push(Some(node));
        idx
    }

    /// Removes the node at `idx`, returning it and recycling the slot.
    fn take(&mut self, idx: Idx) -> Node<K, V> {
        let node = self.slots[idx.usize()].take().expect("stale node index");
        self.free.push(idx);
        node
    }

    /// Count of live slots. O(slots); only the test-side validator calls it.
    #[cfg(test)]
    fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

// =============================================================================
// RbTree
// =============================================================================

/// An ordered map backed by a red-black tree.
///
/// Nodes live in an index-based arena owned exclusively by the tree; callers
/// only ever see key/value data, never node identity. The element count is
/// cached, so [`RbTree::len`] is O(1); [`RbTree::height`] walks the whole
/// tree and is O(n).
pub struct RbTree<K, V> {
    nodes: NodeArena<K, V>,
    root: Idx,
    count: usize,
}

impl<K, V> RbTree<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            root: Idx::NIL,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Removes every entry and releases all node storage.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = Idx::NIL;
        self.count = 0;
    }

    /// Height of the tree: 0 when empty, 1 for a single node.
    ///
    /// Not cached — this is a full O(n) traversal. The red-black invariants
    /// bound the result by `2 * log2(len + 1)`.
    pub fn height(&self) -> usize {
        let mut max = 0usize;
        let mut stack: Vec<(Idx, usize)> = Vec::new();
        if !self.root.is_nil() {
            stack.push((self.root, 1));
        }
        while let Some((idx, depth)) = stack.pop() {
            max = max.max(depth);
            let node = self.nodes.get(idx);
            if !node.left.is_nil() {
                stack.push((node.left, depth + 1));
            }
            if !node.right.is_nil() {
                stack.push((node.right, depth + 1));
            }
        }
        max
    }

    // =========================================================================
    // Link accessors
    // =========================================================================
    //
    // Fixup code reads much closer to the textbook procedures when relatives
    // are fetched through these helpers. `color` accepts NIL (absent children
    // are black); the link accessors require a live index.

    #[inline]
    fn left(&self, idx: Idx) -> Idx {
        self.nodes.get(idx).left
    }

    #[inline]
    fn right(&self, idx: Idx) -> Idx {
        self.nodes.get(idx).right
    }

    #[inline]
    fn parent(&self, idx: Idx) -> Idx {
        self.nodes.get(idx).parent
    }

    #[inline]
    fn color(&self, idx: Idx) -> Color {
        if idx.is_nil() {
            Color::Black
        } else {
            self.nodes.get(idx).color
        }
    }

    #[inline]
    fn set_left(&mut self, idx: Idx, child: Idx) {
        self.nodes.get_mut(idx).left = child;
    }

    #[inline]
    fn set_right(&mut self, idx: Idx, child: Idx) {
        self.nodes.get_mut(idx).right = child;
    }

    #[inline]
    fn set_parent(&mut self, idx: Idx, parent: Idx) {
        self.nodes.get_mut(idx).parent = parent;
    }

    #[inline]
    fn set_color(&mut self, idx: Idx, color: Color) {
        self.nodes.get_mut(idx).color = color;
    }

    // =========================================================================
    // Rotations
    // =========================================================================

    /// Left rotation at `x`: `x`'s right child `y` takes `x`'s position, `x`
    /// becomes `y`'s left child, and `y`'s former left subtree reattaches as
    /// `x`'s right subtree. In-order sequence is preserved.
    fn rotate_left(&mut self, x: Idx) {
        let y = self.right(x);
        debug_assert!(!y.is_nil(), "left rotation needs a right child");

        let yl = self.left(y);
        self.set_right(x, yl);
        if !yl.is_nil() {
            self.set_parent(yl, x);
        }

        let p = self.parent(x);
        self.set_parent(y, p);
        if p.is_nil() {
            self.root = y;
        } else if self.left(p) == x {
            self.set_left(p, y);
        } else {
            self.set_right(p, y);
        }

        self.set_left(y, x);
        self.set_parent(x, y);
    }

    /// Mirror of [`RbTree::rotate_left`].
    fn rotate_right(&mut self, x: Idx) {
        let y = self.left(x);
        debug_assert!(!y.is_nil(), "right rotation needs a left child");

        let yr = self.right(y);
        self.set_left(x, yr);
        if !yr.is_nil() {
            self.set_parent(yr, x);
        }

        let p = self.parent(x);
        self.set_parent(y, p);
        if p.is_nil() {
            self.root = y;
        } else if self.left(p) == x {
            self.set_left(p, y);
        } else {
            self.set_right(p, y);
        }

        self.set_right(y, x);
        self.set_parent(x, y);
    }
}

impl<K: Ord, V> RbTree<K, V> {
    #[inline]
    fn find(&self, key: &K) -> Idx {
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = self.nodes.get(cur);
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return cur,
            };
        }
        Idx::NIL
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let idx = self.find(key);
        if idx.is_nil() {
            None
        } else {
            Some(&self.nodes.get(idx).value)
        }
    }

    /// Looks up `key` and returns a mutable reference to its value, letting
    /// the caller edit a stored record in place. The reference lives until
    /// the next call that touches the tree.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find(key);
        if idx.is_nil() {
            None
        } else {
            Some(&mut self.nodes.get_mut(idx).value)
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        !self.find(key).is_nil()
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts `key` → `value`. Returns `false` and leaves the tree untouched
    /// if the key is already present; existing values are never overwritten.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        // BST descent to the parent of the insertion point.
        let mut parent = Idx::NIL;
        let mut cur = self.root;
        let mut went_left = false;
        while !cur.is_nil() {
            let node = self.nodes.get(cur);
            parent = cur;
            match key.cmp(&node.key) {
                Ordering::Less => {
                    cur = node.left;
                    went_left = true;
                }
                Ordering::Greater => {
                    cur = node.right;
                    went_left = false;
                }
                Ordering::Equal => return false,
            }
        }

        // New nodes start red so only the red-red invariant can break here.
        let idx = self.nodes.alloc(Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: Idx::NIL,
            right: Idx::NIL,
        });
        if parent.is_nil() {
            self.root = idx;
        } else if went_left {
            self.set_left(parent, idx);
        } else {
            self.set_right(parent, idx);
        }
        self.count += 1;

        self.insert_fixup(idx);
        true
    }

    /// Restores the color invariants after `n` was placed as a red leaf.
    ///
    /// While `n`'s parent is red, the grandparent's other child (the uncle)
    /// decides the case: a red uncle is recolored and the violation moves up
    /// two levels; a black uncle takes one or two rotations and terminates.
    fn insert_fixup(&mut self, mut n: Idx) {
        while n != self.root && self.color(self.parent(n)) == Color::Red {
            let p = self.parent(n);
            // The parent is red, so it is not the (black) root and the
            // grandparent exists.
            let g = self.parent(p);
            debug_assert!(!g.is_nil());

            if p == self.left(g) {
                let uncle = self.right(g);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    n = g;
                } else {
                    if n == self.right(p) {
                        // Inner (zig-zag) child: rotate into the outer case.
                        n = p;
                        self.rotate_left(n);
                    }
                    let p = self.parent(n);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.left(g);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    n = g;
                } else {
                    if n == self.left(p) {
                        n = p;
                        self.rotate_right(n);
                    }
                    let p = self.parent(n);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_left(g);
                }
            }
        }
        // Recoloring may have propagated all the way up.
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Removes `key`, returning its value, or `None` (tree untouched) if the
    /// key is absent.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let z = self.find(key);
        if z.is_nil() {
            return None;
        }

        // Two-child removal reduces to splicing out the in-order predecessor
        // (rightmost node of the left subtree), which has at most one child.
        let y = if self.left(z).is_nil() || self.right(z).is_nil() {
            z
        } else {
            let mut y = self.left(z);
            while !self.right(y).is_nil() {
                y = self.right(y);
            }
            y
        };

        // x is y's single child, possibly NIL. A NIL x still occupies a
        // position for fixup purposes, so its parent and side are carried
        // explicitly instead of through a sentinel node.
        let x = if !self.left(y).is_nil() {
            self.left(y)
        } else {
            self.right(y)
        };
        let x_parent = self.parent(y);
        let x_is_left = !x_parent.is_nil() && self.left(x_parent) == y;

        // Splice y out: link x into y's slot under y's parent.
        if x_parent.is_nil() {
            self.root = x;
        } else if x_is_left {
            self.set_left(x_parent, x);
        } else {
            self.set_right(x_parent, x);
        }
        if !x.is_nil() {
            self.set_parent(x, x_parent);
        }

        let y_color = self.color(y);
        let spliced = self.nodes.take(y);

        // When the predecessor was spliced, its key/value move into z; z
        // keeps its node identity and position, so no rebalancing happens at
        // z's location. z's original value is what gets returned.
        let removed = if y != z {
            let znode = self.nodes.get_mut(z);
            znode.key = spliced.key;
            std::mem::replace(&mut znode.value, spliced.value)
        } else {
            spliced.value
        };

        self.count -= 1;
        if y_color == Color::Black {
            // A black node left the tree: the path through x is one black
            // short until the fixup rebalances it.
            self.remove_fixup(x, x_parent, x_is_left);
        }
        Some(removed)
    }

    /// Restores the black-height invariant after a black node was spliced
    /// out, leaving `x` (possibly NIL, treated as black) one black short.
    ///
    /// `x_parent` and `x_is_left` locate x even when it is NIL.
    fn remove_fixup(&mut self, mut x: Idx, mut x_parent: Idx, mut x_is_left: bool) {
        while x != self.root && self.color(x) == Color::Black {
            debug_assert!(!x_parent.is_nil());
            if x_is_left {
                let mut w = self.right(x_parent);
                debug_assert!(!w.is_nil(), "deficit side implies a sibling");
                if self.color(w) == Color::Red {
                    // Red sibling: rotate it above, converting to one of the
                    // black-sibling cases below.
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_left(x_parent);
                    w = self.right(x_parent);
                }
                if self.color(self.left(w)) == Color::Black
                    && self.color(self.right(w)) == Color::Black
                {
                    // Both nephews black: drop a black from the sibling side
                    // too and push the deficit up to the parent.
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.parent(x);
                    x_is_left = !x_parent.is_nil() && self.left(x_parent) == x;
                } else {
                    if self.color(self.right(w)) == Color::Black {
                        // Near nephew red, far black: rotate into the far case.
                        let wl = self.left(w);
                        self.set_color(wl, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.right(x_parent);
                    }
                    // Far nephew red: one rotation restores the black count.
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let wr = self.right(w);
                    self.set_color(wr, Color::Black);
                    self.rotate_left(x_parent);
                    x = self.root;
                }
            } else {
                let mut w = self.left(x_parent);
                debug_assert!(!w.is_nil(), "deficit side implies a sibling");
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_right(x_parent);
                    w = self.left(x_parent);
                }
                if self.color(self.left(w)) == Color::Black
                    && self.color(self.right(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.parent(x);
                    x_is_left = !x_parent.is_nil() && self.left(x_parent) == x;
                } else {
                    if self.color(self.left(w)) == Color::Black {
                        let wr = self.right(w);
                        self.set_color(wr, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(x_parent);
                    }
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let wl = self.left(w);
                    self.set_color(wl, Color::Black);
                    self.rotate_right(x_parent);
                    x = self.root;
                }
            }
        }
        if !x.is_nil() {
            // Either x was red (absorb the extra black) or x is the root.
            self.set_color(x, Color::Black);
        }
    }
}

impl<K, V> RbTree<K, V> {
    /// In-order iteration over `(&key, &value)` pairs, ascending by key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }
}

impl<K, V> Default for RbTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for RbTree<K, V> {
    /// Deep copy: the cloned tree has the same shape, colors, and contents,
    /// and shares no storage with the original. Cloning the arena slot-for-
    /// slot preserves every index link, so no re-insertion or re-balancing
    /// is needed.
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            count: self.count,
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for RbTree<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, K, V> {
    tree: &'a RbTree<K, V>,
    stack: Vec<Idx>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut idx: Idx) {
        while !idx.is_nil() {
            self.stack.push(idx);
            idx = self.tree.nodes.get(idx).left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let tree = self.tree;
        let node = tree.nodes.get(idx);
        self.push_left_spine(node.right);
        Some((&node.key, &node.value))
    }
}


#[cfg(test)]
mod proptests;
