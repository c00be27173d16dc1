//! In-order traversal.
//!
//! Both iterators walk the tree with an explicit stack of pending left
//! spines, so memory use is bounded by tree height and no recursion is
//! involved.

use std::iter::FusedIterator;

use crate::arena::{Slot, NONE};
use crate::Pos;

/// Positions of all live nodes in ascending order.
pub struct Positions<'a, T> {
    slots: &'a [Slot<T>],
    stack: Vec<u32>,
    remaining: usize,
}

impl<'a, T> Positions<'a, T> {
    pub(crate) fn new(slots: &'a [Slot<T>], root: u32, len: usize) -> Self {
        let mut it = Self {
            slots,
            stack: Vec::new(),
            remaining: len,
        };
        it.push_left_spine(root);
        it
    }

    fn push_left_spine(&mut self, mut node: u32) {
        while node != NONE {
            self.stack.push(node);
            node = self.slots[node as usize].left;
        }
    }
}

impl<'a, T> Iterator for Positions<'a, T> {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        let node = self.stack.pop()?;
        self.push_left_spine(self.slots[node as usize].right);
        self.remaining = self.remaining.saturating_sub(1);
        Some(Pos(node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Positions<'_, T> {}
impl<T> FusedIterator for Positions<'_, T> {}

/// Values in ascending order.
pub struct Iter<'a, T> {
    positions: Positions<'a, T>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(slots: &'a [Slot<T>], root: u32, len: usize) -> Self {
        Self {
            positions: Positions::new(slots, root, len),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let pos = self.positions.next()?;
        let slots: &'a [Slot<T>] = self.positions.slots;
        slots[pos.0 as usize].value()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}
