//! # avl-arena
//!
//! An ordered set backed by an AVL tree whose nodes live in a slot arena.
//!
//! Nodes refer to each other by `u32` slot index instead of by pointer, so
//! the arena can relocate its storage when it grows without disturbing the
//! tree. Removed slots are recycled through a free list.
//!
//! Ordering and memory are both pluggable: a [`Comparator`] decides where
//! values go, a [`SlotAllocator`] provides the backing block.
//!
//! ## Example
//!
//! ```rust
//! use avl_arena::AvlTree;
//!
//! let mut tree: AvlTree<u32> = AvlTree::new();
//! tree.insert(20);
//! tree.insert(10);
//! tree.insert(30);
//!
//! let pos = tree.find(&10);
//! assert_ne!(pos, tree.end());
//! assert_eq!(tree.get(pos), Some(&10));
//!
//! assert_eq!(tree.remove(&20), Some(20));
//! assert_eq!(tree.find(&20), tree.end());
//! assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![10, 30]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod allocator;
mod arena;
mod compare;
mod error;
mod iter;
mod path;

pub use allocator::{CountingAllocator, Global, SlotAllocator};
pub use compare::{Comparator, NaturalOrder, ReverseOrder};
pub use error::ReserveError;
pub use iter::{Iter, Positions};

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Index, IndexMut};

use arena::{NodeArena, DEFAULT_GROWTH_STEP, NONE};
use path::{Dir, Path, Step};

// =============================================================================
// Positions
// =============================================================================

/// Handle to a node, as returned by [`AvlTree::find`].
///
/// A position stays valid until its node is removed or the tree is
/// cleared; growth of the arena does not invalidate it. After removal the
/// slot may be reused by a later insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Pos(pub(crate) u32);

impl Pos {
    /// The "not found" position.
    pub const END: Pos = Pos(NONE);

    #[inline]
    pub fn is_end(self) -> bool {
        self.0 == NONE
    }

    /// Slot index, or `None` for [`Pos::END`].
    #[inline]
    pub fn index(self) -> Option<usize> {
        if self.is_end() {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Construction parameters for [`AvlTree::with_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Slots to reserve up front.
    pub initial_capacity: usize,
    /// Slots added each time the arena runs out of free slots (minimum 1).
    pub growth_step: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            growth_step: DEFAULT_GROWTH_STEP,
        }
    }
}

// =============================================================================
// AvlTree
// =============================================================================

/// An ordered set of `T` kept as an arena-backed AVL tree.
///
/// Every live node keeps `height(right) - height(left)` in `{-1, 0, 1}`, so
/// `find`, `insert` and `remove` are O(log n).
pub struct AvlTree<T, C = NaturalOrder, A: SlotAllocator = Global> {
    arena: NodeArena<T, A>,
    root: u32,
    len: usize,
    comparator: C,
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        Self::new_in(NaturalOrder, Global)
    }
}

impl<T, C> AvlTree<T, C> {
    pub fn with_comparator(comparator: C) -> Self {
        Self::new_in(comparator, Global)
    }
}

impl<T, C, A: SlotAllocator> AvlTree<T, C, A> {
    pub fn new_in(comparator: C, alloc: A) -> Self {
        Self {
            arena: NodeArena::new_in(alloc, DEFAULT_GROWTH_STEP),
            root: NONE,
            len: 0,
            comparator,
        }
    }

    /// # Panics
    /// Panics if `config.initial_capacity` exceeds the slot index space.
    pub fn with_config(config: Config, comparator: C, alloc: A) -> Self {
        let mut tree = Self {
            arena: NodeArena::new_in(alloc, config.growth_step),
            root: NONE,
            len: 0,
            comparator,
        };
        tree.reserve(config.initial_capacity);
        tree
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total slots in the arena, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The "not found" position; equal to [`Pos::END`].
    #[inline]
    pub fn end(&self) -> Pos {
        Pos::END
    }

    #[inline]
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        self.arena.allocator()
    }

    /// Value at `pos`, or `None` for [`Pos::END`] and positions whose node has
    /// been removed. A position whose slot was reused by a later insert
    /// yields that newer value.
    #[inline]
    pub fn get(&self, pos: Pos) -> Option<&T> {
        self.arena.get(pos.0)
    }

    /// Mutable access to the value at `pos`.
    ///
    /// Changing how the value compares breaks the tree's ordering; only
    /// modify parts the comparator ignores.
    #[inline]
    pub fn get_mut(&mut self, pos: Pos) -> Option<&mut T> {
        self.arena.get_mut(pos.0)
    }

    /// Smallest value.
    pub fn first(&self) -> Option<&T> {
        self.extreme(Dir::Left)
    }

    /// Largest value.
    pub fn last(&self) -> Option<&T> {
        self.extreme(Dir::Right)
    }

    fn extreme(&self, dir: Dir) -> Option<&T> {
        if self.root == NONE {
            return None;
        }
        let mut node = self.root;
        loop {
            let next = self.arena.child(node, dir);
            if next == NONE {
                return self.arena.get(node);
            }
            node = next;
        }
    }

    /// Search with a probe instead of a value.
    ///
    /// `probe(node)` reports where the sought value lies relative to `node`:
    /// `Less` descends left, `Greater` descends right, `Equal` stops.
    pub fn find_by<F>(&self, mut probe: F) -> Pos
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut node = self.root;
        while node != NONE {
            node = match probe(self.arena.value(node)) {
                Ordering::Equal => return Pos(node),
                Ordering::Less => self.arena.left(node),
                Ordering::Greater => self.arena.right(node),
            };
        }
        Pos::END
    }

    /// Search with a comparator other than the tree's own.
    ///
    /// `comparator` must be coarser than or consistent with the tree's
    /// ordering, e.g. comparing only a key prefix of the stored values.
    pub fn find_with<K>(&self, value: &T, comparator: &K) -> Pos
    where
        K: Comparator<T> + ?Sized,
    {
        self.find_by(|node| comparator.compare(value, node))
    }

    /// Height of the tree; 0 when empty.
    ///
    /// Follows the taller child at each level, so this is O(log n).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root;
        while node != NONE {
            height += 1;
            node = if self.arena.balance(node) > 0 {
                self.arena.right(node)
            } else {
                self.arena.left(node)
            };
        }
        height
    }

    /// Remove every value. Slots stay allocated for reuse.
    pub fn clear(&mut self) {
        let released = self.len;
        let mut stack = Vec::new();
        if self.root != NONE {
            stack.push(self.root);
        }
        self.root = NONE;
        self.len = 0;
        while let Some(node) = stack.pop() {
            let left = self.arena.left(node);
            let right = self.arena.right(node);
            if left != NONE {
                stack.push(left);
            }
            if right != NONE {
                stack.push(right);
            }
            drop(self.arena.destroy(node));
        }
        if released > 0 {
            log::debug!("cleared {} nodes, {} slots retained", released, self.arena.capacity());
        }
    }

    /// Exchange contents, comparators and allocators with `other`.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Make room for at least `additional` more values without growing.
    ///
    /// # Panics
    /// Panics if the request exceeds the slot index space.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            panic!("{}", err);
        }
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<(), ReserveError> {
        let before = self.arena.capacity();
        self.arena.try_reserve(additional)?;
        if self.arena.capacity() != before {
            log::debug!(
                "reserved {} slots: capacity {} -> {}",
                additional,
                before,
                self.arena.capacity()
            );
        }
        Ok(())
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.arena.slots(), self.root, self.len)
    }

    /// Positions of all values, in ascending order.
    pub fn positions(&self) -> Positions<'_, T> {
        Positions::new(self.arena.slots(), self.root, self.len)
    }

    // -------------------------------------------------------------------------
    // Structural helpers
    // -------------------------------------------------------------------------

    /// Point `parent`'s recorded child link (or the root) at `child`.
    #[inline]
    fn relink(&mut self, parent: Option<Step>, child: u32) {
        match parent {
            Some(step) => self.arena.set_child(step.node, step.dir, child),
            None => self.root = child,
        }
    }

    /// Returns the new subtree root (the former left child).
    fn rotate_right(&mut self, node: u32) -> u32 {
        let left = self.arena.left(node);
        debug_assert_ne!(left, NONE, "rotate_right without a left child");
        let inner = self.arena.right(left);
        self.arena.set_left(node, inner);
        self.arena.set_right(left, node);
        left
    }

    /// Returns the new subtree root (the former right child).
    fn rotate_left(&mut self, node: u32) -> u32 {
        let right = self.arena.right(node);
        debug_assert_ne!(right, NONE, "rotate_left without a right child");
        let inner = self.arena.left(right);
        self.arena.set_right(node, inner);
        self.arena.set_left(right, node);
        right
    }

    /// Balance fix-up after LR/RL; `top` is the pivot, still holding its
    /// pre-rotation balance.
    fn fix_double_rotation(&mut self, top: u32) {
        let left = self.arena.left(top);
        let right = self.arena.right(top);
        let (left_balance, right_balance) = match self.arena.balance(top) {
            1 => (-1, 0),
            -1 => (0, 1),
            _ => (0, 0),
        };
        self.arena.set_balance(left, left_balance);
        self.arena.set_balance(right, right_balance);
        self.arena.set_balance(top, 0);
    }

    /// Restore balance at `node`, whose balance is `balance` (±2).
    ///
    /// Returns the new subtree root and whether the subtree kept the height
    /// it had before the rotation became necessary. The latter only happens
    /// during removal, when the heavy child is itself balanced.
    fn rotate_heavy(&mut self, node: u32, balance: i8) -> (u32, bool) {
        if balance < 0 {
            let left = self.arena.left(node);
            let child_balance = self.arena.balance(left);
            if child_balance > 0 {
                // LR
                let pivot = self.rotate_left(left);
                self.arena.set_left(node, pivot);
                let top = self.rotate_right(node);
                self.fix_double_rotation(top);
                (top, false)
            } else {
                // LL
                let top = self.rotate_right(node);
                if child_balance == 0 {
                    self.arena.set_balance(top, 1);
                    self.arena.set_balance(node, -1);
                    (top, true)
                } else {
                    self.arena.set_balance(top, 0);
                    self.arena.set_balance(node, 0);
                    (top, false)
                }
            }
        } else {
            let right = self.arena.right(node);
            let child_balance = self.arena.balance(right);
            if child_balance < 0 {
                // RL
                let pivot = self.rotate_right(right);
                self.arena.set_right(node, pivot);
                let top = self.rotate_left(node);
                self.fix_double_rotation(top);
                (top, false)
            } else {
                // RR
                let top = self.rotate_left(node);
                if child_balance == 0 {
                    self.arena.set_balance(top, -1);
                    self.arena.set_balance(node, 1);
                    (top, true)
                } else {
                    self.arena.set_balance(top, 0);
                    self.arena.set_balance(node, 0);
                    (top, false)
                }
            }
        }
    }

    /// Walk back up after a leaf was added below the last step.
    fn rebalance_after_insert(&mut self, path: &mut Path) {
        while let Some(step) = path.pop() {
            let balance = self.arena.balance(step.node) + step.dir.grow_delta();
            self.arena.set_balance(step.node, balance);
            match balance {
                0 => return,
                -1 | 1 => {}
                _ => {
                    // A rotation restores the pre-insert height.
                    let (top, _) = self.rotate_heavy(step.node, balance);
                    self.relink(path.top(), top);
                    return;
                }
            }
        }
    }

    /// Walk back up after the subtree below the last step lost one level.
    fn rebalance_after_remove(&mut self, path: &mut Path) {
        while let Some(step) = path.pop() {
            let balance = self.arena.balance(step.node) - step.dir.grow_delta();
            self.arena.set_balance(step.node, balance);
            match balance {
                -1 | 1 => return,
                0 => {}
                _ => {
                    let (top, height_unchanged) = self.rotate_heavy(step.node, balance);
                    self.relink(path.top(), top);
                    if height_unchanged {
                        return;
                    }
                }
            }
        }
    }
}

impl<T, C: Comparator<T>, A: SlotAllocator> AvlTree<T, C, A> {
    /// Position of a value equal to `value`, or [`end`](Self::end).
    #[inline]
    pub fn find(&self, value: &T) -> Pos {
        self.find_with(value, &self.comparator)
    }

    #[inline]
    pub fn contains(&self, value: &T) -> bool {
        !self.find(value).is_end()
    }

    /// Descend towards `value`, recording each step. Returns the matching
    /// node or `NONE`.
    fn descend(&self, value: &T, path: &mut Path) -> u32 {
        let mut node = self.root;
        while node != NONE {
            let dir = match self.comparator.compare(value, self.arena.value(node)) {
                Ordering::Equal => return node,
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
            };
            path.push(node, dir);
            node = self.arena.child(node, dir);
        }
        NONE
    }

    /// Add `value` unless an equal value is already present.
    ///
    /// Returns `false` (dropping `value`) when an equal node exists; the
    /// stored value is left untouched.
    pub fn insert(&mut self, value: T) -> bool {
        if self.root == NONE {
            self.root = self.arena.create(value);
            self.len = 1;
            return true;
        }

        let mut path = Path::new();
        let mut node = self.root;
        loop {
            let dir = match self.comparator.compare(&value, self.arena.value(node)) {
                Ordering::Equal => return false,
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
            };
            path.push(node, dir);
            let next = self.arena.child(node, dir);
            if next == NONE {
                let leaf = self.arena.create(value);
                self.arena.set_child(node, dir, leaf);
                break;
            }
            node = next;
        }

        self.len += 1;
        self.rebalance_after_insert(&mut path);
        true
    }

    /// Remove the node equal to `value` and hand its value back.
    pub fn remove(&mut self, value: &T) -> Option<T> {
        let mut path = Path::new();
        let target = self.descend(value, &mut path);
        if target == NONE {
            return None;
        }

        let left = self.arena.left(target);
        let right = self.arena.right(target);
        if right == NONE {
            self.relink(path.top(), left);
        } else if self.arena.left(right) == NONE {
            // The right child moves up and takes over the left subtree.
            let balance = self.arena.balance(target);
            self.arena.set_left(right, left);
            self.arena.set_balance(right, balance);
            self.relink(path.top(), right);
            path.push(right, Dir::Right);
        } else {
            // Splice out the in-order successor and put it in target's place.
            let depth = path.len();
            path.push(target, Dir::Right);
            let mut parent = right;
            let successor = loop {
                path.push(parent, Dir::Left);
                let next = self.arena.left(parent);
                if self.arena.left(next) == NONE {
                    break next;
                }
                parent = next;
            };

            let successor_right = self.arena.right(successor);
            let balance = self.arena.balance(target);
            self.arena.set_left(parent, successor_right);
            self.arena.set_left(successor, left);
            self.arena.set_right(successor, right);
            self.arena.set_balance(successor, balance);

            let above = depth.checked_sub(1).and_then(|d| path.get(d));
            self.relink(above, successor);
            path.set(depth, successor, Dir::Right);
        }

        let removed = self.arena.destroy(target);
        self.len -= 1;
        self.rebalance_after_remove(&mut path);
        Some(removed)
    }
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: Clone, A: SlotAllocator + Clone> Clone for AvlTree<T, C, A> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            root: self.root,
            len: self.len,
            comparator: self.comparator.clone(),
        }
    }
}

impl<T: fmt::Debug, C, A: SlotAllocator> fmt::Debug for AvlTree<T, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, C, A: SlotAllocator> Index<Pos> for AvlTree<T, C, A> {
    type Output = T;

    fn index(&self, pos: Pos) -> &T {
        match self.get(pos) {
            Some(value) => value,
            None => panic!("{:?} does not refer to a live node", pos),
        }
    }
}

impl<T, C, A: SlotAllocator> IndexMut<Pos> for AvlTree<T, C, A> {
    fn index_mut(&mut self, pos: Pos) -> &mut T {
        match self.get_mut(pos) {
            Some(value) => value,
            None => panic!("{:?} does not refer to a live node", pos),
        }
    }
}

impl<T, C: Comparator<T>, A: SlotAllocator> Extend<T> for AvlTree<T, C, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, C: Comparator<T> + Default, A: SlotAllocator + Default> FromIterator<T>
    for AvlTree<T, C, A>
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new_in(C::default(), A::default());
        tree.extend(iter);
        tree
    }
}

impl<'a, T, C, A: SlotAllocator> IntoIterator for &'a AvlTree<T, C, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}


#[cfg(test)]
mod proptests;
