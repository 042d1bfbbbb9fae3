mod common;

use common::{immediate, FakeHost};
use rootpool::pool::POOL_CAPACITY;
use rootpool::{last_error, Config, Registry, RootError};

/// Round-trip: for any value v, `get(create(v)) == v`.
#[test]
fn round_trip_through_create_and_get() {
    let registry = Registry::new(FakeHost::new());
    let v = immediate(42);
    let h = registry.create(v).expect("room in a fresh pool");
    assert_eq!(registry.get(h), v);
}

/// Scenario A: fill a single pool, then drain it in creation order.
#[test]
fn fill_and_free_single_pool() {
    let registry = Registry::new(FakeHost::new());
    let mut handles = Vec::with_capacity(POOL_CAPACITY);
    for i in 0..POOL_CAPACITY {
        handles.push(registry.create(immediate(i)).expect("pool has room"));
    }
    assert_eq!(registry.stats().pools_allocated, 1);

    for h in handles {
        registry.delete(h);
    }

    assert_eq!(registry.live_pool_count(), 1, "pool lingers as FREE until a major GC");
    registry.major_collection();
    assert_eq!(registry.live_pool_count(), 0);
}

/// Scenario F: crossing the deletion threshold mask triggers exactly one
/// slow-path `delete`. `DEALLOC_THRESHOLD` is a byte count (spec 4.1,
/// matching boxroot.h:176's `alloc_count & (DEALLOC_THRESHOLD - 1)`
/// verbatim, unlike `is_not_too_full`'s separate word-divided check), and
/// it is larger than `POOL_CAPACITY` slots, so the mask only ever turns
/// true at `alloc_count == 0` — draining the pool completely.
#[test]
fn threshold_crossing_demotes_pool_exactly_once() {
    let registry = Registry::new(FakeHost::new());
    let mut handles = Vec::with_capacity(POOL_CAPACITY);
    for i in 0..POOL_CAPACITY {
        handles.push(registry.create(immediate(i)).expect("pool has room"));
    }
    // keep this pool out of `current` so draining it triggers
    // reclassification instead of being the live allocation target.
    registry.create(immediate(0)).expect("second pool");

    let before = registry.stats().delete_slow;
    let last = handles.pop().unwrap();
    for h in handles.drain(..) {
        registry.delete(h);
    }
    assert_eq!(registry.stats().delete_slow, before, "no crossing until the pool is fully drained");

    registry.delete(last);
    assert_eq!(registry.stats().delete_slow, before + 1, "draining the last slot crosses the mask exactly once");
}

/// Coverage for the multi-pool branch of `create_slow`: creating past a
/// single pool's capacity must not drop the pool that gets demoted to
/// `young` out of every ring. Regression test for a bug where popping a
/// ring's head before checking its fullness silently discarded a full
/// pool (and its live roots) instead of leaving it in place.
#[test]
fn creating_past_one_pool_capacity_keeps_every_pool_live() {
    let registry = Registry::new(FakeHost::new());
    let extra = 64;
    let mut handles = Vec::with_capacity(POOL_CAPACITY + extra);
    for i in 0..POOL_CAPACITY + extra {
        handles.push(registry.create(immediate(i)).expect("room across multiple pools"));
    }

    assert_eq!(registry.live_pool_count(), 2, "capacity + extra roots span exactly two pools");
    for (i, h) in handles.iter().enumerate() {
        assert_eq!(registry.get(*h), immediate(i), "every handle from the full first pool must still read back");
    }

    for h in handles {
        registry.delete(h);
    }
    assert_eq!(registry.live_pool_count(), 2, "pools linger as FREE until a major GC");
    registry.major_collection();
    assert_eq!(registry.live_pool_count(), 0);
}

/// Property 7: tearing down twice is safe and a no-op the second time.
#[test]
fn teardown_is_idempotent() {
    let registry = Registry::new(FakeHost::new());
    let h = registry.create(immediate(1)).unwrap();
    registry.delete(h);
    registry.teardown();
    registry.teardown();
    assert!(registry.create(immediate(2)).is_none());
}

#[test]
fn modify_in_place_on_a_young_pool() {
    let registry = Registry::new(FakeHost::new());
    let mut h = registry.create(immediate(7)).unwrap();
    assert!(registry.modify(&mut h, immediate(8)));
    assert_eq!(registry.get(h), immediate(8));
}

/// Section 7: `create`/`modify` without the domain lock held fail
/// cleanly and report `NoDomainLock` through the errno-style channel
/// instead of panicking or silently succeeding.
#[test]
fn create_and_modify_without_domain_lock_report_no_domain_lock() {
    let registry = Registry::new(FakeHost::new());
    let mut h = registry.create(immediate(1)).unwrap();

    registry.host().without_any_lock();
    assert!(registry.create(immediate(2)).is_none());
    assert_eq!(last_error(), Some(RootError::NoDomainLock));

    assert!(!registry.modify(&mut h, immediate(3)));
    assert_eq!(last_error(), Some(RootError::NoDomainLock));
}

#[test]
fn single_threaded_config_never_needs_the_remote_path() {
    let registry = Registry::with_config(FakeHost::new(), Config::single_threaded());
    let h = registry.create(immediate(1)).unwrap();
    registry.delete(h);
    assert_eq!(registry.stats().remote_frees, 0);
}
