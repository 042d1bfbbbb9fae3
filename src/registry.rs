//! Public handle API: `create`, `get`, `get_ref`, `modify`, `delete`,
//! plus the GC integration entry points (`scan_roots`, `minor_begin`,
//! `minor_end`, `domain_terminated`) and lifecycle (`setup`/`teardown`).
//!
//! Routes every operation through the owning domain's [`DomainRings`]
//! classifier. The hot path (`create`/`get`/`get_ref`/`modify` in the
//! common case, and `delete` in the common case) never takes the
//! registry-wide lock, only the uncontended per-domain one the calling
//! domain already effectively owns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::Config;
use crate::domain::DomainRings;
use crate::error::{set_last_error, RegistryStatus, RootError};
use crate::host::{Host, ScanKind};
use crate::orphan::Orphanage;
use crate::pool::{DomainId, Pool, PoolClass};
use crate::slot::{Handle, Value};
use crate::stats::{Stats, StatsCounters};

const STATUS_NOT_SETUP: u8 = 0;
const STATUS_RUNNING: u8 = 1;
const STATUS_TORE_DOWN: u8 = 2;
const STATUS_INVALID: u8 = 3;

pub struct Registry<H: Host> {
    host: H,
    domains: RwLock<HashMap<DomainId, Arc<parking_lot::Mutex<DomainRings>>>>,
    orphanage: Orphanage,
    status: AtomicU8,
    config: Config,
    stats: StatsCounters,
}

impl<H: Host> Registry<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, Config::default())
    }

    pub fn with_config(host: H, config: Config) -> Self {
        info!(multithreaded = config.multithreaded, "registry initialized");
        Registry {
            host,
            domains: RwLock::new(HashMap::new()),
            orphanage: Orphanage::new(),
            status: AtomicU8::new(STATUS_RUNNING),
            config,
            stats: StatsCounters::default(),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_NOT_SETUP => RegistryStatus::NotSetup,
            STATUS_RUNNING => RegistryStatus::Running,
            STATUS_TORE_DOWN => RegistryStatus::TornDown,
            _ => RegistryStatus::Invalid,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn domain_rings(&self, id: DomainId) -> Arc<parking_lot::Mutex<DomainRings>> {
        if let Some(existing) = self.domains.read().get(&id) {
            return existing.clone();
        }
        self.domains
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(DomainRings::new(id))))
            .clone()
    }

    /// Register a domain explicitly (usually not needed: `create`
    /// lazily creates its `DomainRings` on first use). Exposed so a
    /// host binding can pre-warm a domain before any roots exist.
    pub fn register_domain(&self, id: DomainId) {
        self.domain_rings(id);
    }

    // ---- hot path ----

    #[inline]
    pub fn create(&self, value: Value) -> Option<Handle> {
        match self.status() {
            RegistryStatus::Running => {}
            RegistryStatus::NotSetup => {
                set_last_error(RootError::NotSetup);
                return None;
            }
            RegistryStatus::TornDown => {
                set_last_error(RootError::TornDown);
                return None;
            }
            RegistryStatus::Invalid => {
                set_last_error(RootError::Invalid);
                return None;
            }
        }
        let domain_id = self.host.current_domain_id();
        if !self.host.domain_lock_held(domain_id) {
            set_last_error(RootError::NoDomainLock);
            return None;
        }
        let rings = self.domain_rings(domain_id);
        let mut rings = rings.lock();
        if let Some(pool) = rings.current_pool() {
            if let Some(h) = unsafe { pool.as_ref() }.try_alloc(value) {
                return Some(h);
            }
        }
        self.stats.create_slow();
        let Some(pool) = rings.create_slow(&self.stats) else {
            set_last_error(RootError::OutOfMemory);
            return None;
        };
        unsafe { pool.as_ref() }.try_alloc(value)
    }

    #[inline]
    pub fn get(&self, handle: Handle) -> Value {
        let pool = unsafe { Pool::of_handle(handle) };
        unsafe { pool.as_ref() }.read(handle)
    }

    #[inline]
    pub fn get_ref(&self, handle: Handle) -> *mut Value {
        handle.0.as_ptr() as *mut Value
    }

    /// Only an old-classed pool receiving a young value forces a
    /// reallocation: the reverse (a young pool holding an old value)
    /// never violates the class invariant, so it's written in place.
    #[inline]
    pub fn modify(&self, handle: &mut Handle, value: Value) -> bool {
        if !self.host.domain_lock_held(self.host.current_domain_id()) {
            set_last_error(RootError::NoDomainLock);
            return false;
        }
        let pool = unsafe { Pool::of_handle(*handle) };
        let pool_ref = unsafe { pool.as_ref() };
        if pool_ref.class() != PoolClass::Old || !self.host.is_block(value) || !self.host.is_young(value) {
            pool_ref.write(*handle, value);
            return true;
        }
        self.modify_slow(pool, handle, value)
    }

    #[inline]
    pub fn delete(&self, handle: Handle) {
        let pool = unsafe { Pool::of_handle(handle) };
        let pool_ref = unsafe { pool.as_ref() };
        let owner = pool_ref.domain_id();
        let local = !self.config.force_remote
            && self.host.domain_lock_held(owner)
            && self.host.current_domain_id() == owner;

        if local {
            let rings = self.domain_rings(owner);
            let mut rings = rings.lock();
            let count = pool_ref.local_free(handle);
            // Mask, not divided by word size: spec 4.1 / boxroot.h:176
            // both test `alloc_count & (DEALLOC_THRESHOLD - 1)` directly.
            // The `/ word_size` adjustment belongs only to
            // `Pool::is_not_too_full` (spec 4.2), a separate check.
            if count & (crate::config::DEALLOC_THRESHOLD - 1) == 0 {
                self.stats.delete_slow();
                self.delete_slow_local(&mut rings, pool);
            }
        } else {
            self.stats.remote_frees();
            self.delete_remote(pool_ref, handle);
        }
    }

    // ---- slow paths ----

    fn delete_slow_local(&self, rings: &mut DomainRings, pool: std::ptr::NonNull<Pool>) {
        if rings.current == Some(pool) {
            // Still the domain's allocation target, not yet linked into
            // any ring: draining it back to zero just means it has
            // every slot free again, not that it should be reclassified
            // out from under `current`.
            return;
        }
        let pool_ref = unsafe { pool.as_ref() };
        if pool_ref.local_alloc_count() == 0 && pool_ref.anticipated_alloc_count() == 0 {
            // pool crossed the threshold and is now fully empty; give
            // it straight back to the free ring rather than waiting
            // for the next GC to notice.
            match pool_ref.class() {
                PoolClass::Young => rings.young.remove(pool),
                PoolClass::Old => rings.old.remove(pool),
                PoolClass::Untracked => {}
            }
            pool_ref.set_class(PoolClass::Untracked);
            rings.free.push_front(pool);
            trace!("pool emptied on local delete, reclassified to free");
        }
    }

    /// No domain lock is held for this pool at all (or the force-remote
    /// test toggle is set): push onto the atomic delayed list. Taking
    /// the pool mutex here only serializes against a concurrent drain
    /// that also has no domain lock backing it — normally the caller
    /// *does* hold some domain's lock and the mutex is unnecessary, but
    /// a lockless caller (e.g. a finalizer) needs it.
    fn delete_remote(&self, pool_ref: &Pool, handle: Handle) {
        if self.host.domain_lock_held(self.host.current_domain_id()) {
            // caller holds *some* domain's lock, just not this pool's
            // owner's: the atomic push alone is enough.
            pool_ref.remote_free(handle);
            return;
        }
        // caller holds no domain lock at all (e.g. a finalizer): guard
        // against a concurrent drain that also lacks one.
        let _guard = pool_ref.mutex().lock();
        pool_ref.remote_free(handle);
    }

    fn modify_slow(&self, pool: std::ptr::NonNull<Pool>, handle: &mut Handle, value: Value) -> bool {
        self.stats.modify_slow();
        match self.create(value) {
            Some(new_handle) => {
                self.delete(*handle);
                *handle = new_handle;
                true
            }
            None => {
                // Out of memory: keep reachability by writing in place
                // and falling back to the host's remembered set, per
                // the stricter cross-domain reallocation rule (see
                // DESIGN.md): only old-to-young transitions force a
                // reallocation attempt in the first place.
                warn!("modify reallocation failed, falling back to remembered set");
                unsafe { pool.as_ref() }.write(*handle, value);
                let slot = self.get_ref(*handle);
                self.host.remember(unsafe { &mut *slot });
                true
            }
        }
    }

    // ---- GC integration ----

    #[instrument(skip(self))]
    pub fn minor_begin(&self) {
        trace!("minor collection begin");
    }

    /// Run the minor-collection protocol for every known domain: fold
    /// the current pool into young, drain delayed lists, adopt orphans,
    /// scan young, then promote every surviving young pool to old.
    #[instrument(skip(self))]
    pub fn minor_end(&self) {
        self.stats.minor_scans();
        self.adopt_orphans_into_first_domain();
        let domains = self.domains.read();
        for rings in domains.values() {
            let mut rings = rings.lock();
            rings.fold_current_into_young();
            rings.gc_pool_rings();
            self.scan_domain(&mut rings, ScanKind::Minor);
            rings.promote_young_to_old();
        }
        self.note_live_pools(&domains);
        debug!("minor collection end");
    }

    /// Full scan plus reclamation of fully-drained pools: used for
    /// major collections.
    #[instrument(skip(self))]
    pub fn major_collection(&self) {
        self.stats.major_scans();
        self.adopt_orphans_into_first_domain();
        let domains = self.domains.read();
        for rings in domains.values() {
            let mut rings = rings.lock();
            rings.fold_current_into_young();
            rings.gc_pool_rings();
            self.scan_domain(&mut rings, ScanKind::Major);
            rings.free_untracked_pools(&self.stats);
        }
        self.note_live_pools(&domains);
        debug!("major collection end");
    }

    /// Record this collection's live-pool count for peak tracking.
    /// Takes the already-held domain table read guard rather than
    /// calling `live_pool_count` to avoid re-acquiring it.
    fn note_live_pools(&self, domains: &HashMap<DomainId, Arc<parking_lot::Mutex<DomainRings>>>) {
        let live: usize = domains.values().map(|r| r.lock().live_pool_count()).sum::<usize>() + self.orphanage.len();
        self.stats.note_live_pools(live as u64);
    }

    fn adopt_orphans_into_first_domain(&self) {
        let orphans = self.orphanage.adopt_all();
        if orphans.is_empty() {
            return;
        }
        let domains = self.domains.read();
        if let Some(first) = domains.values().next() {
            first.lock().adopt_all(orphans);
        } else {
            // no live domain to adopt into; put them back for the next
            // collection rather than leaking them.
            self.orphanage.deposit(orphans);
        }
    }

    fn scan_domain(&self, rings: &mut DomainRings, kind: ScanKind) {
        debug_assert!(rings.current.is_none(), "current pool must be folded into young before scanning");
        for pool in rings.young.iter() {
            self.scan_pool(pool, kind);
        }
        if kind == ScanKind::Major {
            for pool in rings.old.iter() {
                self.scan_pool(pool, kind);
            }
        }
    }

    /// Count-driven scan: stop once `anticipated_alloc_count` allocated
    /// slots have been visited rather than always walking all
    /// `POOL_CAPACITY` of them. A slot whose raw word still points back
    /// into the pool is a free-list link, not a value, and is skipped
    /// without counting toward the target — mirrors the original
    /// design's `is_pool_member`-gated loop.
    fn scan_pool(&self, pool: std::ptr::NonNull<Pool>, kind: ScanKind) {
        let pool_ref = unsafe { pool.as_ref() };
        let mut visited = 0usize;
        let target = pool_ref.anticipated_alloc_count().max(0) as usize;
        if target == 0 {
            return;
        }
        for index in 0..crate::pool::POOL_CAPACITY {
            if visited >= target {
                break;
            }
            // SAFETY: index < POOL_CAPACITY by the loop bound.
            let raw = unsafe { pool_ref.slot_raw(index) };
            if pool_ref.is_member(raw) {
                continue;
            }
            let value = Value(raw);
            if !self.host.is_block(value) {
                visited += 1;
                continue;
            }
            if kind == ScanKind::Minor && !self.host.is_young(value) {
                continue;
            }
            let mut cell = value;
            self.host.scan_action(kind, value, &mut cell);
            if cell != value {
                unsafe { pool_ref.set_slot_raw(index, cell.bits()) };
            }
            self.stats.slots_scanned(1);
            visited += 1;
        }
    }

    pub fn domain_terminated(&self, id: DomainId) {
        let Some(rings) = self.domains.write().remove(&id) else {
            return;
        };
        let mut rings = rings.lock();
        let pools = rings.drain_all_for_orphaning();
        self.orphanage.deposit(pools);
        info!(domain = id, "domain terminated, pools orphaned");
    }

    pub fn teardown(&self) {
        if self
            .status
            .compare_exchange(STATUS_RUNNING, STATUS_TORE_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let mut domains = self.domains.write();
        for (_, rings) in domains.drain() {
            let mut rings = rings.lock();
            for pool in rings.drain_all_for_orphaning() {
                unsafe { Pool::dealloc(pool) };
                self.stats.pools_freed();
            }
        }
        for pool in self.orphanage.adopt_all() {
            unsafe { Pool::dealloc(pool) };
            self.stats.pools_freed();
        }
        info!("registry torn down");
    }

    pub fn live_pool_count(&self) -> usize {
        self.domains.read().values().map(|r| r.lock().live_pool_count()).sum::<usize>() + self.orphanage.len()
    }
}

impl DomainRings {
    fn adopt_all(&mut self, pools: Vec<std::ptr::NonNull<Pool>>) {
        for pool in pools {
            self.adopt(pool);
        }
    }
}
