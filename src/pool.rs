//! A single pool: a page-aligned block of slots, its local free list,
//! and the lock-free delayed free list that absorbs deletes from
//! threads that don't own the pool's domain.
//!
//! Layout mirrors the original design's `struct pool`: a header
//! followed by a dense slot array, sized so that `size_of::<Pool>()`
//! fits inside `POOL_SIZE` and the pool's base address can be recovered
//! from any slot address by masking off `POOL_LOG_SIZE` low bits.

use std::cell::UnsafeCell;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::config::{DEALLOC_THRESHOLD, POOL_SIZE};
use crate::platform::{self, PoolMutex};
use crate::slot::{Handle, Value};

const WORD_SIZE: usize = size_of::<usize>();

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PoolClass {
    Young,
    Old,
    Untracked,
}

pub type DomainId = u32;

/// Fixed-offset header shared by every pool. Lives at the pool's base
/// address, so `pool_ptr as *mut PoolHeader` always works.
#[repr(C)]
pub struct PoolHeader {
    /// Head of the local, non-atomic free list. Equals the pool's own
    /// base address (the sentinel) when the list is empty.
    free_next: UnsafeCell<usize>,
    /// Tail of the local free list; meaningful only once the list has
    /// been non-empty at least once.
    free_end: UnsafeCell<usize>,
    /// Allocated-slot count as seen locally (not adjusted for remote
    /// frees still sitting in the delayed list).
    free_alloc_count: UnsafeCell<usize>,
    domain_id: UnsafeCell<DomainId>,
    class: UnsafeCell<PoolClass>,
    prev: UnsafeCell<*mut Pool>,
    next: UnsafeCell<*mut Pool>,
    /// Protects the delayed list against a drainer racing a pusher
    /// that holds no domain lock at all, and protects class/ring
    /// mutation made outside STW.
    mutex: PoolMutex<()>,
    /// Lock-free, push-only free list fed by remote deletes, cache-line
    /// padded so remote pushers hammering it don't bounce the line the
    /// owning domain's local free list lives on.
    delayed: CachePadded<Delayed>,
}

struct Delayed {
    /// Head of the delayed list. Holds the pool's own base address
    /// (the sentinel) when empty.
    next: AtomicUsize,
    end: UnsafeCell<usize>,
    /// Signed: decremented (below zero, eventually) by every remote
    /// free; added back to `free_alloc_count` on drain.
    alloc_count: AtomicIsize,
}

pub const POOL_CAPACITY: usize = (POOL_SIZE - size_of::<PoolHeader>()) / WORD_SIZE;

#[repr(C)]
pub struct Pool {
    header: PoolHeader,
    slots: [UnsafeCell<usize>; POOL_CAPACITY],
}

const _: () = assert!(size_of::<Pool>() <= POOL_SIZE);
const _: () = assert!(DEALLOC_THRESHOLD.is_power_of_two());

// SAFETY: every field behind the `UnsafeCell`s is synchronized by the
// registry's own protocol rather than by the type system — the ring
// links and local free list by the owning domain's lock (or STW), the
// delayed list by atomics plus `mutex` for the lockless-pusher case.
// Handing a `NonNull<Pool>` to another thread is exactly what orphaning
// a terminated domain's pools and remote deletes both require.
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
    /// Allocate a fresh, page-aligned pool with every slot linked into
    /// the local free list, terminating at the pool's own base address.
    pub fn new_boxed(domain_id: DomainId) -> Option<NonNull<Pool>> {
        // Plain (not zeroed) allocation: every header field is written
        // explicitly below and every slot is written by
        // `link_all_slots_free`, so there's no byte of the pool whose
        // value matters before we overwrite it — in particular we
        // never rely on a zeroed bit pattern being a valid `Mutex` or
        // `CachePadded`.
        let raw = platform::alloc_aligned(POOL_SIZE, POOL_SIZE)?;
        let pool_ptr = raw.cast::<Pool>();
        // SAFETY: freshly allocated, POOL_SIZE bytes, aligned to POOL_SIZE,
        // and every header field is initialized via `ptr::write` before
        // any read of it.
        unsafe {
            let pool = pool_ptr.as_ptr();
            let base = pool_ptr.as_ptr() as usize;
            std::ptr::addr_of_mut!((*pool).header).write(PoolHeader {
                free_next: UnsafeCell::new(base),
                free_end: UnsafeCell::new(base),
                free_alloc_count: UnsafeCell::new(0),
                domain_id: UnsafeCell::new(domain_id),
                class: UnsafeCell::new(PoolClass::Young),
                prev: UnsafeCell::new(pool),
                next: UnsafeCell::new(pool),
                mutex: PoolMutex::new(()),
                delayed: CachePadded::new(Delayed {
                    next: AtomicUsize::new(base),
                    end: UnsafeCell::new(base),
                    alloc_count: AtomicIsize::new(0),
                }),
            });
            (*pool).link_all_slots_free(base);
        }
        Some(pool_ptr)
    }

    /// # Safety
    /// `ptr` must have been produced by [`Pool::new_boxed`] and not
    /// already freed.
    pub unsafe fn dealloc(ptr: NonNull<Pool>) {
        platform::dealloc_aligned(ptr.cast(), POOL_SIZE, POOL_SIZE);
    }

    /// Thread every slot into the local free list, last-to-first, so
    /// the list reads in ascending address order. `sentinel` is the
    /// pool's own base address: the empty-list marker.
    unsafe fn link_all_slots_free(&self, sentinel: usize) {
        let mut next = sentinel;
        for slot in self.slots.iter().rev() {
            *slot.get() = next;
            next = slot.get() as usize;
        }
        *self.header.free_next.get() = next;
        *self.header.free_end.get() = self.slot_addr(POOL_CAPACITY - 1);
    }

    #[inline]
    pub fn base(&self) -> usize {
        self as *const Pool as usize
    }

    #[inline]
    fn slot_addr(&self, index: usize) -> usize {
        &self.slots[index] as *const _ as usize
    }

    /// Address of slot `index`, for callers (the scan loop) that need
    /// to walk the array by position rather than by handle.
    #[inline]
    pub fn slot_address(&self, index: usize) -> usize {
        self.slot_addr(index)
    }

    /// Raw word stored at slot `index`, without interpreting it as a
    /// `Value` or a free-list link — the scan loop tells the two apart
    /// itself via [`Pool::is_member`].
    ///
    /// # Safety
    /// `index` must be `< POOL_CAPACITY`.
    #[inline]
    pub unsafe fn slot_raw(&self, index: usize) -> usize {
        *self.slots[index].get()
    }

    /// # Safety
    /// `index` must be `< POOL_CAPACITY`.
    #[inline]
    pub unsafe fn set_slot_raw(&self, index: usize, raw: usize) {
        *self.slots[index].get() = raw;
    }

    /// Recover the owning pool from any slot address. Relies on
    /// `POOL_SIZE`-alignment: every pool's base address has its low
    /// `POOL_LOG_SIZE` bits clear, and no pool spills past its own
    /// `POOL_SIZE` window.
    #[inline]
    pub unsafe fn of_handle(handle: Handle) -> NonNull<Pool> {
        let addr = handle.0.as_ptr() as usize;
        let base = addr & !(POOL_SIZE - 1);
        NonNull::new_unchecked(base as *mut Pool)
    }

    /// Is `addr` within this pool's slot array? Used by the
    /// count-driven scan loop to tell allocated slots from free-list
    /// links and end-of-pool sentinels apart.
    #[inline]
    pub fn is_member(&self, addr: usize) -> bool {
        let base = self.base();
        addr >= base && addr < base + POOL_SIZE
    }

    #[inline]
    pub fn class(&self) -> PoolClass {
        unsafe { *self.header.class.get() }
    }

    #[inline]
    pub fn set_class(&self, class: PoolClass) {
        unsafe { *self.header.class.get() = class };
    }

    #[inline]
    pub fn domain_id(&self) -> DomainId {
        unsafe { *self.header.domain_id.get() }
    }

    #[inline]
    pub fn set_domain_id(&self, id: DomainId) {
        unsafe { *self.header.domain_id.get() = id };
    }

    #[inline]
    pub fn local_alloc_count(&self) -> usize {
        unsafe { *self.header.free_alloc_count.get() }
    }

    /// `free_list.alloc_count + delayed.alloc_count`: the number of
    /// slots that are allocated from this pool's own point of view,
    /// counting remote frees not yet drained. Can momentarily read
    /// nonzero even for a pool with no live roots, until drained.
    #[inline]
    pub fn anticipated_alloc_count(&self) -> isize {
        self.local_alloc_count() as isize + self.header.delayed.alloc_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_not_too_full(&self) -> bool {
        self.local_alloc_count() <= DEALLOC_THRESHOLD / WORD_SIZE
    }

    // ---- ring links, manipulated only by `ring` under the owning
    // domain's lock or during STW ----

    #[inline]
    pub fn prev(&self) -> *mut Pool {
        unsafe { *self.header.prev.get() }
    }
    #[inline]
    pub fn set_prev(&self, p: *mut Pool) {
        unsafe { *self.header.prev.get() = p };
    }
    #[inline]
    pub fn next(&self) -> *mut Pool {
        unsafe { *self.header.next.get() }
    }
    #[inline]
    pub fn set_next(&self, p: *mut Pool) {
        unsafe { *self.header.next.get() = p };
    }

    pub fn mutex(&self) -> &PoolMutex<()> {
        &self.header.mutex
    }

    // ---- local free list: caller must hold the owning domain's lock ----

    /// Pop a free slot and write `value` into it. `None` if the pool is
    /// full (caller takes the slow path).
    #[inline]
    pub fn try_alloc(&self, value: Value) -> Option<Handle> {
        let head = unsafe { *self.header.free_next.get() };
        if head == self.base() {
            return None;
        }
        let head_ptr = head as *mut usize;
        let next = unsafe { *head_ptr };
        unsafe { *self.header.free_next.get() = next };
        unsafe { *self.header.free_alloc_count.get() += 1 };
        unsafe { *head_ptr = value.bits() };
        Some(Handle(unsafe { NonNull::new_unchecked(head_ptr) }))
    }

    /// Push a slot back onto the local free list. Returns the local
    /// allocation count after the decrement, so the caller can test
    /// the demotion threshold without a second load.
    #[inline]
    pub fn local_free(&self, handle: Handle) -> usize {
        let slot_ptr = handle.0.as_ptr();
        let head = unsafe { *self.header.free_next.get() };
        if head == self.base() {
            unsafe { *self.header.free_end.get() = slot_ptr as usize };
        }
        unsafe { *slot_ptr = head };
        unsafe { *self.header.free_next.get() = slot_ptr as usize };
        let count = unsafe {
            let c = self.header.free_alloc_count.get();
            *c -= 1;
            *c
        };
        count
    }

    #[inline]
    pub fn read(&self, handle: Handle) -> Value {
        Value(unsafe { *handle.0.as_ptr() })
    }

    #[inline]
    pub fn write(&self, handle: Handle, value: Value) {
        unsafe { *handle.0.as_ptr() = value.bits() };
    }

    // ---- delayed free list: lock-free push, drained under proven
    // exclusivity only ----

    /// Push `handle` onto the delayed free list. Safe to call from any
    /// thread regardless of which domain owns this pool. No ABA hazard:
    /// there is never a concurrent pop.
    pub fn remote_free(&self, handle: Handle) {
        let slot_ptr = handle.0.as_ptr();
        let base = self.base();
        let old_head = self.header.delayed.next.swap(slot_ptr as usize, Ordering::Relaxed);
        unsafe { *slot_ptr = old_head };
        if old_head == base {
            unsafe { *self.header.delayed.end.get() = slot_ptr as usize };
        }
        // Release: pairs with the acquire in `anticipated_alloc_count`
        // and in `drain`'s exclusivity check, so a domain that observes
        // the count reaching zero also observes this push's slot write.
        self.header.delayed.alloc_count.fetch_sub(1, Ordering::Release);
    }

    /// Merge the delayed list into the local free list. Caller must
    /// hold either the pool mutex, STW, or have just observed
    /// `anticipated_alloc_count() == 0` via an acquire fence.
    pub fn drain(&self) {
        let base = self.base();
        let delayed_head = self.header.delayed.next.swap(base, Ordering::Acquire);
        if delayed_head == base {
            return;
        }
        let delayed_count = self.header.delayed.alloc_count.swap(0, Ordering::Relaxed);

        let local_head = unsafe { *self.header.free_next.get() };
        let delayed_end = unsafe { *self.header.delayed.end.get() };
        if local_head == base {
            unsafe { *self.header.free_end.get() = delayed_end };
        } else {
            unsafe { *(delayed_end as *mut usize) = local_head };
        }
        unsafe { *self.header.free_next.get() = delayed_head };
        unsafe {
            let c = self.header.free_alloc_count.get();
            // delayed_count is <= 0 (it only ever decreases from 0).
            *c = (*c as isize + delayed_count) as usize;
        }
    }
}
