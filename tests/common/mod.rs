//! Shared fixture for the integration tests: a `Host` that doesn't
//! depend on a real moving GC. Values are tagged by hand so a test can
//! build an immediate, a young block, or an old block without needing
//! the real host's heap at all.
//!
//! Bit layout of a fake `Value`: bit 0 set means immediate; bit 0
//! clear means block, and then bit 1 distinguishes young (set) from
//! old (clear).

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use rootpool::{Host, ScanKind, Value};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber once per test binary, gated by
/// `RUST_LOG`/`TEST_LOG` so a plain `cargo test` run stays quiet and
/// `TEST_LOG=trace cargo test -- --nocapture` shows the registry's own
/// pool-reclassification and scan events.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env("TEST_LOG"))
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn immediate(n: usize) -> Value {
    Value((n << 2) | 0b01)
}

pub fn young_block(n: usize) -> Value {
    Value((n << 2) | 0b10)
}

pub fn old_block(n: usize) -> Value {
    Value(n << 2)
}

/// Records every scan visit and lets a test flip which domain is
/// "current" and whether that domain's lock is considered held, so a
/// single-threaded test can simulate cross-domain remote deletes and
/// lockless finalizer callers without real threads.
pub struct FakeHost {
    current_domain: AtomicU32,
    lock_held: std::sync::atomic::AtomicBool,
    visits: Mutex<Vec<(ScanKind, Value)>>,
    remembered: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        init_tracing();
        FakeHost {
            current_domain: AtomicU32::new(0),
            lock_held: std::sync::atomic::AtomicBool::new(true),
            visits: Mutex::new(Vec::new()),
            remembered: AtomicUsize::new(0),
        }
    }

    pub fn as_domain(&self, id: u32) {
        self.current_domain.store(id, Ordering::SeqCst);
        self.lock_held.store(true, Ordering::SeqCst);
    }

    pub fn without_any_lock(&self) {
        self.lock_held.store(false, Ordering::SeqCst);
    }

    pub fn visit_count(&self) -> usize {
        self.visits.lock().unwrap().len()
    }

    pub fn visits_of(&self, kind: ScanKind) -> usize {
        self.visits.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn remembered_count(&self) -> usize {
        self.remembered.load(Ordering::SeqCst)
    }
}

impl Host for FakeHost {
    fn is_block(&self, v: Value) -> bool {
        v.bits() & 0b01 == 0
    }

    fn is_young(&self, v: Value) -> bool {
        v.bits() & 0b10 != 0
    }

    fn current_domain_id(&self) -> u32 {
        self.current_domain.load(Ordering::SeqCst)
    }

    fn domain_lock_held(&self, domain: u32) -> bool {
        self.lock_held.load(Ordering::SeqCst) && domain == self.current_domain_id()
    }

    fn scan_action(&self, kind: ScanKind, value: Value, _slot: &mut Value) {
        self.visits.lock().unwrap().push((kind, value));
    }

    fn remember(&self, _slot: &mut Value) {
        self.remembered.fetch_add(1, Ordering::SeqCst);
    }
}
