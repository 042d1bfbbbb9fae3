//! Read-only statistics surface. Each field is backed by a plain atomic
//! bumped from the hot and slow paths; [`StatsCounters::snapshot`] reads
//! them independently with relaxed ordering, so a snapshot taken while
//! the registry is live can observe a torn mix of counters — acceptable
//! for an operational dashboard, never relied on for correctness.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatsCounters {
    pools_allocated: AtomicU64,
    pools_freed: AtomicU64,
    peak_pools: AtomicU64,
    ring_ops: AtomicU64,
    create_slow: AtomicU64,
    delete_slow: AtomicU64,
    modify_slow: AtomicU64,
    minor_scans: AtomicU64,
    major_scans: AtomicU64,
    slots_scanned: AtomicU64,
    remote_frees: AtomicU64,
}

macro_rules! bump {
    ($name:ident) => {
        pub fn $name(&self) {
            self.$name.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl StatsCounters {
    bump!(pools_allocated);
    bump!(pools_freed);
    bump!(ring_ops);
    bump!(create_slow);
    bump!(delete_slow);
    bump!(modify_slow);
    bump!(minor_scans);
    bump!(major_scans);
    bump!(remote_frees);

    pub fn slots_scanned(&self, n: u64) {
        self.slots_scanned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn note_live_pools(&self, live: u64) {
        let mut peak = self.peak_pools.load(Ordering::Relaxed);
        while live > peak {
            match self.peak_pools.compare_exchange_weak(
                peak,
                live,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            pools_allocated: self.pools_allocated.load(Ordering::Relaxed),
            pools_freed: self.pools_freed.load(Ordering::Relaxed),
            peak_pools: self.peak_pools.load(Ordering::Relaxed),
            ring_ops: self.ring_ops.load(Ordering::Relaxed),
            create_slow: self.create_slow.load(Ordering::Relaxed),
            delete_slow: self.delete_slow.load(Ordering::Relaxed),
            modify_slow: self.modify_slow.load(Ordering::Relaxed),
            minor_scans: self.minor_scans.load(Ordering::Relaxed),
            major_scans: self.major_scans.load(Ordering::Relaxed),
            slots_scanned: self.slots_scanned.load(Ordering::Relaxed),
            remote_frees: self.remote_frees.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`StatsCounters`], safe to log or compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub pools_allocated: u64,
    pub pools_freed: u64,
    pub peak_pools: u64,
    pub ring_ops: u64,
    pub create_slow: u64,
    pub delete_slow: u64,
    pub modify_slow: u64,
    pub minor_scans: u64,
    pub major_scans: u64,
    pub slots_scanned: u64,
    pub remote_frees: u64,
}
