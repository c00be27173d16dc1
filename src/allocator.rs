//! Raw memory providers for the node arena.
//!
//! The arena asks its allocator for one contiguous block each time it grows
//! and hands the previous block back once the slots have been moved across.
//! Nothing else in the tree touches the allocator.

use std::alloc::{self, Layout};
use std::cell::Cell;
use std::ptr::NonNull;

/// A source of raw, aligned memory blocks.
///
/// # Safety
///
/// `allocate` must return a block valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, that stays valid
/// until it is passed back to `release` with the same layout. The arena
/// never requests a zero-sized layout.
pub unsafe trait SlotAllocator {
    /// Allocate a block for `layout`. Failure is fatal.
    fn allocate(&self, layout: Layout) -> NonNull<u8>;

    /// Return a block obtained from `allocate`.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same
    /// `layout` and must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide Rust allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: delegates to `std::alloc`, which upholds the contract.
unsafe impl SlotAllocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0);
        // SAFETY: the arena never requests zero-sized layouts.
        let ptr = unsafe { alloc::alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        }
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees `ptr` came from `allocate(layout)`.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// SAFETY: forwards to `A`.
unsafe impl<A: SlotAllocator + ?Sized> SlotAllocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr, layout) }
    }
}

/// Wraps [`Global`] and counts traffic.
///
/// Borrow it into a tree (`AvlTree::new_in(cmp, &counting)`) to inspect how
/// many blocks the arena holds at any point.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: Cell<usize>,
    releases: Cell<usize>,
    live_bytes: Cell<usize>,
    peak_bytes: Cell<usize>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `allocate` calls.
    pub fn n_allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Total number of `release` calls.
    pub fn n_releases(&self) -> usize {
        self.releases.get()
    }

    /// Blocks currently handed out.
    pub fn live_blocks(&self) -> usize {
        self.allocations.get() - self.releases.get()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.get()
    }
}

// SAFETY: delegates to `Global`.
unsafe impl SlotAllocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        let ptr = Global.allocate(layout);
        self.allocations.set(self.allocations.get() + 1);
        let live = self.live_bytes.get() + layout.size();
        self.live_bytes.set(live);
        self.peak_bytes.set(self.peak_bytes.get().max(live));
        ptr
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        self.releases.set(self.releases.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        // SAFETY: forwarded contract.
        unsafe { Global.release(ptr, layout) }
    }
}
