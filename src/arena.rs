//! Slot arena backing the tree.
//!
//! All nodes live in one contiguous block of [`Slot`]s obtained from a
//! [`SlotAllocator`]. Nodes refer to each other by `u32` slot index, never by
//! address, so growing the block (which moves every slot) leaves node
//! identity intact. Unused slots form a singly linked free list.
//!
//! Free slot layout:
//! - `balance == FREE`
//! - `left == NONE`
//! - `right` = next free index (or `NONE`)
//! - `value` uninitialised

use std::alloc::Layout;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::slice;

use crate::allocator::SlotAllocator;
use crate::error::{ReserveError, Result};
use crate::path::Dir;

/// Absent child / absent root / not found.
pub(crate) const NONE: u32 = u32::MAX;

/// Balance tag marking a free slot.
const FREE: i8 = i8::MIN;

/// Largest slot count; every index stays below `NONE`.
pub(crate) const MAX_SLOTS: usize = u32::MAX as usize;

pub(crate) const DEFAULT_GROWTH_STEP: usize = 16;

pub(crate) struct Slot<T> {
    /// `height(right) - height(left)` while live, `FREE` otherwise.
    pub(crate) balance: i8,
    pub(crate) left: u32,
    pub(crate) right: u32,
    value: MaybeUninit<T>,
}

impl<T> Slot<T> {
    #[inline]
    fn vacant(next: u32) -> Self {
        Self {
            balance: FREE,
            left: NONE,
            right: next,
            value: MaybeUninit::uninit(),
        }
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.balance != FREE
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&T> {
        if self.is_live() {
            // SAFETY: live slots always hold an initialised value.
            Some(unsafe { self.value.assume_init_ref() })
        } else {
            None
        }
    }
}

/// Growable slot storage with a free list.
pub(crate) struct NodeArena<T, A: SlotAllocator> {
    slots: NonNull<Slot<T>>,
    capacity: u32,
    free_head: u32,
    free_len: u32,
    growth_step: u32,
    alloc: A,
    _marker: PhantomData<T>,
}

impl<T, A: SlotAllocator> NodeArena<T, A> {
    pub(crate) fn new_in(alloc: A, growth_step: usize) -> Self {
        Self {
            slots: NonNull::dangling(),
            capacity: 0,
            free_head: NONE,
            free_len: 0,
            growth_step: growth_step.clamp(1, MAX_SLOTS) as u32,
            alloc,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn layout(capacity: usize) -> Result<Layout> {
        Layout::array::<Slot<T>>(capacity).map_err(|_| ReserveError::CapacityOverflow {
            requested: capacity,
        })
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot<T>] {
        // SAFETY: `slots` points at `capacity` initialised slots (or is
        // dangling with `capacity == 0`).
        unsafe { slice::from_raw_parts(self.slots.as_ptr(), self.capacity as usize) }
    }

    #[inline]
    fn slots_mut(&mut self) -> &mut [Slot<T>] {
        // SAFETY: as in `slots`, and `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.slots.as_ptr(), self.capacity as usize) }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity as usize
    }

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free_len as usize
    }

    /// Number of live slots.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        (self.capacity - self.free_len) as usize
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Move every slot into a block `additional` slots larger and chain the
    /// new slots onto the free list.
    fn try_grow(&mut self, additional: usize) -> Result<()> {
        if additional == 0 {
            return Ok(());
        }
        let old_cap = self.capacity as usize;
        let new_cap = old_cap
            .checked_add(additional)
            .filter(|&cap| cap <= MAX_SLOTS)
            .ok_or(ReserveError::CapacityOverflow {
                requested: old_cap.saturating_add(additional),
            })?;
        let new_layout = Self::layout(new_cap)?;
        let new_slots = self.alloc.allocate(new_layout).cast::<Slot<T>>();

        // SAFETY: the new block has room for `new_cap` slots and does not
        // overlap the old one, which holds `old_cap` initialised slots. The
        // bitwise copy is a move; the old block is released without
        // dropping anything.
        unsafe {
            if old_cap > 0 {
                ptr::copy_nonoverlapping(self.slots.as_ptr(), new_slots.as_ptr(), old_cap);
                let old_layout = Self::layout(old_cap).expect("layout was valid at allocation");
                self.alloc.release(self.slots.cast(), old_layout);
            }
            for i in old_cap..new_cap {
                let next = if i + 1 < new_cap { (i + 1) as u32 } else { self.free_head };
                new_slots.as_ptr().add(i).write(Slot::vacant(next));
            }
        }

        self.slots = new_slots;
        self.capacity = new_cap as u32;
        self.free_head = old_cap as u32;
        self.free_len += additional as u32;
        log::trace!("node arena grew from {} to {} slots", old_cap, new_cap);
        Ok(())
    }

    /// Ensure at least `additional` free slots, growing in multiples of the
    /// growth step where the index space allows.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let free = self.free_len as usize;
        if additional <= free {
            return Ok(());
        }
        let shortfall = additional - free;
        let step = self.growth_step as usize;
        let headroom = MAX_SLOTS - self.capacity as usize;
        let rounded = shortfall
            .div_ceil(step)
            .saturating_mul(step)
            .min(headroom)
            .max(shortfall);
        self.try_grow(rounded)
    }

    /// Take a free slot (growing if there is none) and move `value` into it.
    ///
    /// # Panics
    /// Panics if the slot index space is exhausted.
    pub(crate) fn create(&mut self, value: T) -> u32 {
        if self.free_head == NONE {
            let step = (self.growth_step as usize).min(MAX_SLOTS - self.capacity as usize);
            if step == 0 {
                panic!("node arena exhausted: {} slots in use", self.capacity);
            }
            if let Err(err) = self.try_grow(step) {
                panic!("node arena growth failed: {}", err);
            }
        }
        let index = self.free_head;
        let slot = &mut self.slots_mut()[index as usize];
        debug_assert!(!slot.is_live(), "free list points at live slot {}", index);
        let next = slot.right;
        slot.balance = 0;
        slot.left = NONE;
        slot.right = NONE;
        slot.value.write(value);
        self.free_head = next;
        self.free_len -= 1;
        index
    }

    /// Move the value out of a live slot and push the slot on the free list.
    ///
    /// # Panics
    /// Panics if `index` is out of range or already free.
    pub(crate) fn destroy(&mut self, index: u32) -> T {
        let head = self.free_head;
        let slot = &mut self.slots_mut()[index as usize];
        assert!(slot.is_live(), "slot {} is not live", index);
        // SAFETY: the slot is live, and it is tagged free right after so the
        // value is never read again.
        let value = unsafe { slot.value.assume_init_read() };
        slot.balance = FREE;
        slot.left = NONE;
        slot.right = head;
        self.free_head = index;
        self.free_len += 1;
        value
    }

    #[inline]
    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        self.slots().get(index as usize).and_then(Slot::value)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let slot = self.slots_mut().get_mut(index as usize)?;
        if slot.is_live() {
            // SAFETY: live slots always hold an initialised value.
            Some(unsafe { slot.value.assume_init_mut() })
        } else {
            None
        }
    }

    /// Value of a node the tree knows to be live.
    #[inline]
    pub(crate) fn value(&self, index: u32) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("node {} is not live", index),
        }
    }

    #[inline]
    pub(crate) fn balance(&self, index: u32) -> i8 {
        let slot = &self.slots()[index as usize];
        debug_assert!(slot.is_live());
        slot.balance
    }

    #[inline]
    pub(crate) fn set_balance(&mut self, index: u32, balance: i8) {
        debug_assert!((-2..=2).contains(&balance));
        let slot = &mut self.slots_mut()[index as usize];
        debug_assert!(slot.is_live());
        slot.balance = balance;
    }

    #[inline]
    pub(crate) fn left(&self, index: u32) -> u32 {
        self.slots()[index as usize].left
    }

    #[inline]
    pub(crate) fn right(&self, index: u32) -> u32 {
        self.slots()[index as usize].right
    }

    #[inline]
    pub(crate) fn set_left(&mut self, index: u32, child: u32) {
        self.slots_mut()[index as usize].left = child;
    }

    #[inline]
    pub(crate) fn set_right(&mut self, index: u32, child: u32) {
        self.slots_mut()[index as usize].right = child;
    }

    #[inline]
    pub(crate) fn child(&self, index: u32, dir: Dir) -> u32 {
        match dir {
            Dir::Left => self.left(index),
            Dir::Right => self.right(index),
        }
    }

    #[inline]
    pub(crate) fn set_child(&mut self, index: u32, dir: Dir, child: u32) {
        match dir {
            Dir::Left => self.set_left(index, child),
            Dir::Right => self.set_right(index, child),
        }
    }

    /// Free-list indices from head to tail.
    #[cfg(test)]
    pub(crate) fn free_list(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.free_len as usize);
        let mut at = self.free_head;
        while at != NONE {
            assert!(!self.slots()[at as usize].is_live(), "live slot {} on free list", at);
            out.push(at);
            at = self.slots()[at as usize].right;
        }
        out
    }
}

impl<T, A: SlotAllocator> Drop for NodeArena<T, A> {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        if std::mem::needs_drop::<T>() {
            for slot in self.slots_mut() {
                if slot.is_live() {
                    slot.balance = FREE;
                    // SAFETY: the slot was live and is now tagged free.
                    unsafe { slot.value.assume_init_drop() };
                }
            }
        }
        let layout = Self::layout(self.capacity as usize).expect("layout was valid at allocation");
        // SAFETY: the block came from `self.alloc` with this layout.
        unsafe { self.alloc.release(self.slots.cast(), layout) };
    }
}

impl<T: Clone, A: SlotAllocator + Clone> Clone for NodeArena<T, A> {
    /// Same capacity, same indices, same free list.
    fn clone(&self) -> Self {
        let mut out = Self::new_in(self.alloc.clone(), self.growth_step as usize);
        let cap = self.capacity as usize;
        if cap == 0 {
            return out;
        }
        let layout = Self::layout(cap).expect("layout was valid at allocation");
        let slots = out.alloc.allocate(layout).cast::<Slot<T>>();
        // SAFETY: fresh block with room for `cap` slots.
        unsafe {
            for i in 0..cap {
                slots.as_ptr().add(i).write(Slot::vacant(NONE));
            }
        }
        // Every slot is tagged free until its value is in place, so a panic
        // in `T::clone` leaves `out` safe to drop.
        out.slots = slots;
        out.capacity = self.capacity;
        for (dst, src) in out.slots_mut().iter_mut().zip(self.slots()) {
            match src.value() {
                Some(value) => {
                    dst.value.write(value.clone());
                    dst.left = src.left;
                    dst.right = src.right;
                    dst.balance = src.balance;
                }
                None => dst.right = src.right,
            }
        }
        out.free_head = self.free_head;
        out.free_len = self.free_len;
        out
    }
}

// SAFETY: the arena owns its values and block exclusively; no interior
// mutability.
unsafe impl<T: Send, A: SlotAllocator + Send> Send for NodeArena<T, A> {}
unsafe impl<T: Sync, A: SlotAllocator + Sync> Sync for NodeArena<T, A> {}
