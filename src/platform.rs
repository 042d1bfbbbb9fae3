//! Low-level primitives the rest of the crate is built on: aligned pool
//! allocation and a mutex wrapper. Kept separate from the pool/ring logic
//! so the allocation strategy can be swapped without touching anything
//! that reasons about slots.

use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

/// Cache line size assumed for padding atomics that are hammered by
/// concurrent remote deletes. 64 bytes covers every mainstream target
/// this crate is built for; getting it wrong costs performance, not
/// correctness.
pub const CACHE_LINE_SIZE: usize = 64;

/// Allocate a zeroed, `align`-aligned block of `size` bytes. `align` must
/// be a power of two and `size` a multiple of `align` (both hold for pool
/// sizes by construction). Returns `None` on allocator failure, never
/// aborts.
pub fn alloc_aligned_zeroed(size: usize, align: usize) -> Option<NonNull<u8>> {
    debug_assert!(align.is_power_of_two());
    debug_assert!(size % align == 0);
    let layout = Layout::from_size_align(size, align).ok()?;
    // SAFETY: layout has non-zero size (pools are always at least one page).
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr)
}

/// Allocate an `align`-aligned block of `size` bytes without zeroing it.
/// Used for scratch allocations where the caller initializes every byte.
pub fn alloc_aligned(size: usize, align: usize) -> Option<NonNull<u8>> {
    debug_assert!(align.is_power_of_two());
    debug_assert!(size % align == 0);
    let layout = Layout::from_size_align(size, align).ok()?;
    let ptr = unsafe { alloc(layout) };
    NonNull::new(ptr)
}

/// Free a block previously returned by [`alloc_aligned`] or
/// [`alloc_aligned_zeroed`] with the same `size`/`align`.
///
/// # Safety
/// `ptr` must have been allocated by this module with the same layout.
pub unsafe fn dealloc_aligned(ptr: NonNull<u8>, size: usize, align: usize) {
    let layout = Layout::from_size_align_unchecked(size, align);
    dealloc(ptr.as_ptr(), layout);
}

/// A plain mutex. Pulled behind this alias so the rest of the crate
/// doesn't care whether it's `parking_lot` or something else; matches
/// the pool-crate convention of wrapping the lock type rather than
/// spelling it out at every call site.
pub type PoolMutex<T> = Mutex<T>;
