use criterion::{black_box, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};

use tradebot::catalog::{Chip, ChipKind, TradeItem};
use tradebot::router::Router;

const ORDERINGS: usize = 7;

fn items(n: usize) -> Vec<TradeItem> {
    (0..n)
        .map(|i| {
            let mut chip = Chip::nothing();
            chip.name = format!("chip{i:04}");
            chip.kind = ChipKind::Standard;
            TradeItem::Chip(chip)
        })
        .collect()
}

/// Seven orderings of the same items, each rotated so targets sit at
/// different depths.
fn orderings(n: usize) -> Vec<Vec<TradeItem>> {
    let base = items(n);
    (0..ORDERINGS)
        .map(|k| {
            let mut ordering = base.clone();
            ordering.rotate_left((k * n / ORDERINGS) % n);
            ordering
        })
        .collect()
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    for &size in &[64_usize, 256, 1024] {
        let router = Router::new(orderings(size)).expect("router");
        let targets = items(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let mut next = 0;
            b.iter(|| {
                let target = &targets[next % targets.len()];
                next += 37;
                black_box(router.route(black_box(target)).expect("route"))
            });
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &size in &[256_usize, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || orderings(size),
                |orderings| black_box(Router::new(orderings).expect("router")),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_route, bench_build);
criterion_main!(benches);
