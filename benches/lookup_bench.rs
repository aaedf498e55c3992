//! Benchmarks for feature lookup
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gol_lookup::index::{build_index, IndexLayout};
use gol_lookup::storage::*;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn create_test_container(count: u64, with_index: bool) -> (PathBuf, TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.gol");

    let mut builder = ContainerBuilder::new();
    for i in 0..count {
        // Sparse IDs so not-found lookups land between real ones
        let id = 1_000_000 + i * 7;
        let name = format!("feature {}", i);
        let tags = [("highway", "residential"), ("name", name.as_str())];
        builder.add(FeatureKey::node(id), vec![0; 16], &tags).unwrap();
        builder.add(FeatureKey::way(id), vec![0; 64], &tags).unwrap();
    }
    builder.write(&path).unwrap();

    if with_index {
        let container = Container::open(&path).unwrap();
        build_index(&container, &IndexLayout::default()).unwrap();
    }

    (path, dir)
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1_000u64, 10_000] {
        let last_id = 1_000_000 + (size - 1) * 7;

        for (label, with_index) in [("indexed", true), ("scan", false)] {
            let (path, _dir) = create_test_container(size, with_index);
            let store = FeatureStore::open(&path).unwrap();

            group.throughput(Throughput::Elements(1));

            group.bench_with_input(BenchmarkId::new(format!("{}_last_way", label), size), &last_id, |b, &id| {
                b.iter(|| store.way(black_box(id)).unwrap())
            });

            group.bench_with_input(BenchmarkId::new(format!("{}_not_found", label), size), &1u64, |b, &id| {
                b.iter(|| store.node(black_box(id)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");

    let (path, _dir) = create_test_container(10_000, true);

    group.bench_function("with_index", |b| {
        b.iter(|| FeatureStore::open(black_box(&path)).unwrap())
    });

    group.finish();
}

fn bench_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("tags");

    let pairs: Vec<(String, String)> = (0..32)
        .map(|i| (format!("key{}", i), format!("value {}", i)))
        .collect();
    let block = encode_tags(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))).unwrap();

    group.throughput(Throughput::Elements(pairs.len() as u64));

    group.bench_function("iterate_32", |b| {
        b.iter(|| {
            let tags = Tags::new(black_box(&block)).unwrap();
            tags.iter().map(|t| t.unwrap().value.len()).sum::<usize>()
        })
    });

    group.bench_function("get_last_of_32", |b| {
        let tags = Tags::new(&block).unwrap();
        b.iter(|| tags.get(black_box("key31")).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_open, bench_tags);
criterion_main!(benches);
