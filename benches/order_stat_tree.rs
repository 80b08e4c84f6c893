//! OrderStatTree micro-benchmarks.
//!
//! Run with: `cargo bench --bench order_stat_tree`

use std::hint::black_box;
use std::time::Instant;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use timestat::ds::OrderStatTree;
use timestat::reading::Reading;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn readings(len: usize, seed: u64) -> Vec<Reading> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            if rng.gen_ratio(1, 30) {
                Reading::Dnf
            } else {
                Reading::Finite(rng.gen_range(5_000..20_000))
            }
        })
        .collect()
}

fn filled(values: &[Reading]) -> OrderStatTree<Reading, usize> {
    let mut tree = OrderStatTree::with_capacity_and_order(values.len(), Default::default());
    for (pos, &v) in values.iter().enumerate() {
        tree.insert(v, pos);
    }
    tree
}

// ============================================================================
// Updates
// ============================================================================

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("ost_insert");
    for size in SIZES {
        let values = readings(size, 1);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| black_box(filled(values)).len())
        });
    }
    group.finish();
}

fn bench_slide(c: &mut Criterion) {
    let mut group = c.benchmark_group("ost_slide");
    for size in SIZES {
        let window = readings(size, 2);
        let incoming = readings(1_000, 3);
        group.throughput(Throughput::Elements(incoming.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || filled(&window),
                |mut tree| {
                    let mut oldest = window.iter();
                    for (i, &v) in incoming.iter().enumerate() {
                        if let Some(old) = oldest.next() {
                            tree.remove(old);
                        }
                        tree.insert(v, size + i);
                    }
                    black_box(tree.len())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ============================================================================
// Queries
// ============================================================================

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("ost_query_ns");
    let size = 10_000;
    let tree = filled(&readings(size, 4));

    group.bench_function("rank", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for i in 0..iters {
                black_box(tree.rank(i as usize % size));
            }
            start.elapsed()
        })
    });

    group.bench_function("rank_of", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for i in 0..iters {
                black_box(tree.rank_of(&Reading::Finite(5_000 + (i % 15_000) as i64)));
            }
            start.elapsed()
        })
    });

    group.bench_function("cum_sum", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for i in 0..iters {
                black_box(tree.cum_sum(i as usize % size));
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_slide, bench_queries);
criterion_main!(benches);
