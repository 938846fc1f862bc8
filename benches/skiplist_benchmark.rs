use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use memdex::LockedIndex;
use memdex::SwmrSkipList;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const PREFILL: u64 = 100_000;
const BATCH: u64 = 10_000;

fn shuffled_keys(count: u64, seed: u64) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..count).collect();
    keys.shuffle(&mut SmallRng::seed_from_u64(seed));
    keys
}

fn upsert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    let keys = shuffled_keys(BATCH, 1);

    group.bench_function("skip_list_insert_10k", |b| {
        b.iter(|| {
            let mut list: SwmrSkipList<u64, u64> = SwmrSkipList::with_height(18).unwrap();
            for &key in &keys {
                list.upsert(key, key);
            }
            black_box(list.len())
        })
    });

    group.bench_function("locked_index_insert_10k", |b| {
        b.iter(|| {
            let index: LockedIndex<u64, u64> = LockedIndex::new();
            for &key in &keys {
                index.upsert(key, key).unwrap();
            }
            black_box(index.len().unwrap())
        })
    });

    group.finish();
}

fn find_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    let mut list: SwmrSkipList<u64, u64> = SwmrSkipList::with_height(18).unwrap();
    let locked: LockedIndex<u64, u64> = LockedIndex::new();
    for &key in &shuffled_keys(PREFILL, 2) {
        list.upsert(key, key);
        locked.upsert(key, key).unwrap();
    }

    let probes = shuffled_keys(PREFILL, 3);
    let mut cursor = 0usize;
    group.bench_function("skip_list_hit", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % probes.len();
            black_box(list.find(&probes[cursor]))
        })
    });

    let mut cursor = 0usize;
    group.bench_function("skip_list_miss", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % probes.len();
            black_box(list.find(&(probes[cursor] + PREFILL)))
        })
    });

    let mut cursor = 0usize;
    group.bench_function("locked_index_hit", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % probes.len();
            black_box(locked.find(&probes[cursor]).unwrap())
        })
    });

    group.finish();
}

/// Lookup latency while a writer keeps churning the same structure. The
/// skip-list readers never take a lock; the baseline readers queue behind
/// the writer.
fn contended_find_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_under_writer");

    {
        let mut list: SwmrSkipList<u64, u64> = SwmrSkipList::with_height(18).unwrap();
        for &key in &shuffled_keys(PREFILL, 4) {
            list.upsert(key, key);
        }
        let reader = list.reader();
        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut round = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let key = round % PREFILL;
                    list.upsert(key, round);
                    round += 1;
                }
            })
        };

        let probes = shuffled_keys(PREFILL, 5);
        let mut cursor = 0usize;
        group.bench_function("skip_list", |b| {
            b.iter(|| {
                cursor = (cursor + 1) % probes.len();
                black_box(reader.find(&probes[cursor]))
            })
        });

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }

    {
        let locked: Arc<LockedIndex<u64, u64>> = Arc::new(LockedIndex::new());
        for &key in &shuffled_keys(PREFILL, 4) {
            locked.upsert(key, key).unwrap();
        }
        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let locked = Arc::clone(&locked);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut round = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let key = round % PREFILL;
                    locked.upsert(key, round).unwrap();
                    round += 1;
                }
            })
        };

        let probes = shuffled_keys(PREFILL, 5);
        let mut cursor = 0usize;
        group.bench_function("locked_index", |b| {
            b.iter(|| {
                cursor = (cursor + 1) % probes.len();
                black_box(locked.find(&probes[cursor]).unwrap())
            })
        });

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }

    group.finish();
}

criterion_group!(
    benches,
    upsert_benchmark,
    find_benchmark,
    contended_find_benchmark
);
criterion_main!(benches);
