//! Benchmarks for the handle hot path (`create`/`get`/`modify`/`delete`)
//! and for `scan_pool` throughput at varying young-hit percentages.
//!
//! Run with: cargo bench --bench hot_path

use std::hint::black_box;
use std::sync::atomic::{AtomicU32, Ordering};

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rootpool::pool::POOL_CAPACITY;
use rootpool::{Host, Registry, ScanKind, Value};

/// A single-domain host with no contention and a tunable young/old mix,
/// so `minor_end`'s scan loop can be benchmarked at different hit rates
/// without needing a real moving collector.
struct BenchHost {
    young_percent: u32,
    counter: AtomicU32,
}

impl BenchHost {
    fn new(young_percent: u32) -> Self {
        BenchHost { young_percent, counter: AtomicU32::new(0) }
    }
}

fn tagged(n: u32, young: bool) -> Value {
    Value(((n as usize) << 2) | if young { 0b10 } else { 0 })
}

impl Host for BenchHost {
    fn is_block(&self, v: Value) -> bool {
        v.bits() & 0b01 == 0
    }

    fn is_young(&self, v: Value) -> bool {
        v.bits() & 0b10 != 0
    }

    fn current_domain_id(&self) -> u32 {
        0
    }

    fn domain_lock_held(&self, _domain: u32) -> bool {
        true
    }

    fn scan_action(&self, _kind: ScanKind, value: Value, slot: &mut Value) {
        black_box(value);
        let _ = slot;
    }

    fn remember(&self, _slot: &mut Value) {}
}

impl BenchHost {
    fn next_value(&self) -> Value {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let young = (n % 100) < self.young_percent;
        tagged(n, young)
    }
}

fn create_delete_round_trip(c: &mut Criterion) {
    let registry = Registry::new(BenchHost::new(0));
    c.bench_function("create_get_delete", |b| {
        b.iter(|| {
            let v = registry.host().next_value();
            let h = registry.create(v).expect("bench registry never exhausts memory");
            black_box(registry.get(h));
            registry.delete(h);
        });
    });
}

fn modify_in_place(c: &mut Criterion) {
    let registry = Registry::new(BenchHost::new(0));
    let mut h = registry.create(tagged(0, false)).unwrap();
    c.bench_function("modify_same_generation", |b| {
        b.iter(|| {
            registry.modify(&mut h, tagged(1, false));
            black_box(h);
        });
    });
}

/// Measures `minor_end`'s scan cost as the fraction of young
/// (scan-worthy) roots varies. Each batch builds a fresh registry with
/// `POOL_CAPACITY * 4` live roots still sitting in the current/young
/// generation, so every measured iteration does a comparable amount of
/// scanning rather than draining to an empty young ring after the
/// first call.
fn scan_pool_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_pool");
    let root_count = (POOL_CAPACITY * 4) as u64;
    for young_percent in [0u32, 10, 50, 90, 100] {
        group.throughput(Throughput::Elements(root_count));
        group.bench_with_input(BenchmarkId::new("minor_end", young_percent), &young_percent, |b, &young_percent| {
            b.iter_batched(
                || {
                    let registry = Registry::new(BenchHost::new(young_percent));
                    for _ in 0..root_count {
                        let v = registry.host().next_value();
                        registry.create(v).unwrap();
                    }
                    registry
                },
                |registry| {
                    registry.minor_begin();
                    registry.minor_end();
                    black_box(&registry);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, create_delete_round_trip, modify_in_place, scan_pool_throughput);
criterion_main!(benches);
