//! Per-domain pool rings and the classifier that moves pools between
//! them. One [`DomainRings`] exists per live domain id; `Registry`
//! owns the table and hands out `&DomainRings` under the domain's own
//! lock.

use std::ptr::NonNull;

use tracing::{debug, trace};

use crate::pool::{DomainId, Pool, PoolClass};
use crate::ring::Ring;
use crate::stats::StatsCounters;

/// The four rings a domain classifies its pools into, plus the single
/// pool currently being allocated from (not itself ring-linked into
/// any of the three).
pub struct DomainRings {
    pub domain_id: DomainId,
    pub current: Option<NonNull<Pool>>,
    pub young: Ring,
    pub old: Ring,
    pub free: Ring,
}

// SAFETY: `current` is the one raw pool pointer not already wrapped in
// a `Ring`; same justification as `Ring`'s own impls applies to it.
unsafe impl Send for DomainRings {}
unsafe impl Sync for DomainRings {}

impl DomainRings {
    pub fn new(domain_id: DomainId) -> Self {
        DomainRings {
            domain_id,
            current: None,
            young: Ring::new(),
            old: Ring::new(),
            free: Ring::new(),
        }
    }

    /// Fast-path allocation target, if any.
    pub fn current_pool(&self) -> Option<NonNull<Pool>> {
        self.current
    }

    /// Move the current pool (if any) into the young ring. Called at
    /// the start of every collection, before `gc_pool_rings`, so the
    /// pool currently being allocated from still gets scanned and
    /// classified like any other young pool.
    pub fn fold_current_into_young(&mut self) {
        if let Some(current) = self.current.take() {
            unsafe { current.as_ref() }.set_class(PoolClass::Young);
            self.young.push_front(current);
        }
    }

    /// The slow path for `create`: the current pool (if any) is full
    /// or absent. Find or make a new current pool and return it.
    pub fn create_slow(&mut self, stats: &StatsCounters) -> Option<NonNull<Pool>> {
        if let Some(full) = self.current.take() {
            unsafe { full.as_ref() }.set_class(PoolClass::Young);
            self.young.push_front(full);
            trace!(domain = self.domain_id, "current pool full, demoted to young");
        }

        self.reclassify_one_drained_pool();

        let next = pop_available(&mut self.young)
            .or_else(|| pop_available(&mut self.old))
            .or_else(|| self.free.pop_front())
            .or_else(|| {
                let fresh = Pool::new_boxed(self.domain_id);
                if fresh.is_some() {
                    stats.pools_allocated();
                }
                fresh
            })?;

        unsafe { next.as_ref() }.set_class(PoolClass::Young);
        self.current = Some(next);
        Some(next)
    }

    /// Amortized bookkeeping: look at the front of the young ring and,
    /// if it is observably empty (drained, or drainable without a
    /// lock because nobody else can hold a slot in it right now), move
    /// it to `free`. At most one pool is touched per call, matching
    /// the "no unbounded slow path" rule.
    fn reclassify_one_drained_pool(&mut self) {
        let Some(candidate) = self.young.head() else {
            return;
        };
        let pool = unsafe { candidate.as_ref() };
        if pool.anticipated_alloc_count() != 0 {
            return;
        }
        pool.drain();
        if pool.local_alloc_count() == 0 {
            self.young.remove(candidate);
            pool.set_class(PoolClass::Untracked);
            self.free.push_front(candidate);
        }
    }

    /// Move every pool that has reached zero live slots (after
    /// draining remote frees) from `young`/`old` into `free`, and every
    /// pool still under the not-too-full threshold to the front of its
    /// class. Called at STW before scanning.
    pub fn gc_pool_rings(&mut self) {
        self.gc_one_ring(RingKind::Young);
        self.gc_one_ring(RingKind::Old);
    }

    fn gc_one_ring(&mut self, kind: RingKind) {
        let ring = match kind {
            RingKind::Young => &mut self.young,
            RingKind::Old => &mut self.old,
        };
        let members: Vec<_> = ring.iter().collect();
        for node in members {
            let pool = unsafe { node.as_ref() };
            pool.drain();
            if pool.local_alloc_count() == 0 {
                match kind {
                    RingKind::Young => self.young.remove(node),
                    RingKind::Old => self.old.remove(node),
                }
                pool.set_class(PoolClass::Untracked);
                self.free.push_front(node);
            }
        }
    }

    /// End-of-minor-collection: every surviving young pool (including
    /// the former current pool, already folded in by
    /// `fold_current_into_young`) is promoted to old. No data moves;
    /// only the class tag and ring membership change.
    pub fn promote_young_to_old(&mut self) {
        let mut promoted = Ring::new();
        std::mem::swap(&mut promoted, &mut self.young);
        for node in promoted.iter() {
            unsafe { node.as_ref() }.set_class(PoolClass::Old);
        }
        self.old.splice_front(&mut promoted);
        debug!(domain = self.domain_id, "promoted young pools to old");
    }

    /// End-of-major-collection: every pool sitting in `free` is handed
    /// back to the platform allocator.
    pub fn free_untracked_pools(&mut self, stats: &StatsCounters) {
        while let Some(node) = self.free.pop_front() {
            unsafe { Pool::dealloc(node) };
            stats.pools_freed();
        }
    }

    /// Adopt a pool recovered from a terminated domain's orphan ring.
    pub fn adopt(&mut self, pool: NonNull<Pool>) {
        let p = unsafe { pool.as_ref() };
        p.set_domain_id(self.domain_id);
        match p.class() {
            PoolClass::Young => self.young.push_front(pool),
            PoolClass::Old => self.old.push_front(pool),
            PoolClass::Untracked => self.free.push_front(pool),
        }
    }

    /// Hand off every pool this domain owns (current plus all three
    /// rings) for orphaning, leaving this `DomainRings` empty.
    pub fn drain_all_for_orphaning(&mut self) -> Vec<NonNull<Pool>> {
        let mut all = Vec::new();
        if let Some(current) = self.current.take() {
            unsafe { current.as_ref() }.set_class(PoolClass::Young);
            all.push(current);
        }
        while let Some(p) = self.young.pop_front() {
            all.push(p);
        }
        while let Some(p) = self.old.pop_front() {
            all.push(p);
        }
        while let Some(p) = self.free.pop_front() {
            all.push(p);
        }
        all
    }

    pub fn live_pool_count(&self) -> usize {
        self.current.is_some() as usize + self.young.len() + self.old.len() + self.free.len()
    }
}

enum RingKind {
    Young,
    Old,
}

/// Peek a ring's head and detach it only if it passes the fullness
/// check; a full pool at the front is left in the ring rather than
/// popped and dropped. Mirrors the original's `pop_available`
/// (boxroot.c:394), which checks `is_full_pool` *before* unlinking.
fn pop_available(ring: &mut Ring) -> Option<NonNull<Pool>> {
    let head = ring.head()?;
    if !unsafe { head.as_ref() }.is_not_too_full() {
        return None;
    }
    ring.pop_front()
}
