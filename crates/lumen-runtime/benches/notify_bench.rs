//! Benchmarks for notification fan-out and derivation chains.
//!
//! Run with: cargo bench -p lumen-runtime

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lumen_runtime::reactive::{MapOptions, Observable, map};
use std::hint::black_box;

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/fan_out");

    for n in [1, 10, 100, 1_000] {
        let cell = Observable::new(0_u64);
        let subs: Vec<_> = (0..n)
            .map(|_| cell.subscribe_fn(|v| {
                black_box(*v);
            }))
            .collect();
        group.bench_with_input(BenchmarkId::new("set", n), &cell, |b, cell| {
            let mut i = 0_u64;
            b.iter(|| {
                i += 1;
                cell.set(black_box(i));
            })
        });
        drop(subs);
    }

    group.finish();
}

fn bench_map_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/map_chain");

    for depth in [1, 8, 32] {
        let root = Observable::new(0_i64);
        let mut chain = vec![map(&root, |v| v + 1, MapOptions::default())];
        for _ in 1..depth {
            let next = map(&chain[chain.len() - 1], |v| v + 1, MapOptions::default());
            chain.push(next);
        }
        group.bench_with_input(BenchmarkId::new("set", depth), &root, |b, root| {
            let mut i = 0_i64;
            b.iter(|| {
                i += 1;
                root.set(black_box(i));
            })
        });
        black_box(chain.last().map(|d| d.get()));
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_map_chain);

criterion_main!(benches);
