//! Holding area for pools that belonged to a domain which has since
//! terminated. A live domain adopts them at the next collection.
//! Protected by its own mutex since it is the one piece of pool state
//! touched by a domain other than the one that allocated the memory,
//! outside of STW.

use std::ptr::NonNull;

use tracing::debug;

use crate::platform::PoolMutex;
use crate::pool::Pool;
use crate::ring::Ring;

#[derive(Default)]
pub struct Orphanage {
    ring: PoolMutex<Ring>,
}

impl Orphanage {
    pub fn new() -> Self {
        Orphanage {
            ring: PoolMutex::new(Ring::new()),
        }
    }

    pub fn deposit(&self, pools: Vec<NonNull<Pool>>) {
        if pools.is_empty() {
            return;
        }
        let mut ring = self.ring.lock();
        for pool in pools {
            ring.push_front(pool);
        }
        debug!(count = ring.len(), "orphan ring grew");
    }

    /// Drain every orphaned pool. Called by whichever domain runs the
    /// next collection; the caller is responsible for adopting each
    /// returned pool into its own rings.
    pub fn adopt_all(&self) -> Vec<NonNull<Pool>> {
        let mut ring = self.ring.lock();
        let mut drained = Vec::with_capacity(ring.len());
        while let Some(p) = ring.pop_front() {
            drained.push(p);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
