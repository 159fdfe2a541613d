//! Performance benchmarks for link-path-lib
//!
//! Run with: cargo bench --package link-path-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use link_path_lib::geometry::{self, Coordinate};
use link_path_lib::{LinkId, PathStore};
use std::hint::black_box;

/// Generate a winding road-like path with the specified number of points.
fn generate_path(num_points: usize, base_lat: f64, base_lon: f64) -> Vec<Coordinate> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 / num_points as f64;
            let lat = base_lat + t * 0.1 + (t * 50.0).sin() * 0.001;
            let lon = base_lon + t * 0.1 + (t * 30.0).cos() * 0.001;
            Coordinate::new(lat, lon).unwrap()
        })
        .collect()
}

// ============================================================================
// Geometry Benchmarks
// ============================================================================

fn bench_path_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_length");

    for &num_points in &[1_000usize, 10_000, 100_000] {
        let path = generate_path(num_points, 51.5, -0.1);
        group.throughput(Throughput::Elements(num_points as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_points), &path, |b, path| {
            b.iter(|| geometry::path_length(black_box(path)));
        });
    }

    group.finish();
}

fn bench_best_insertion_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_insertion_index");

    let point = Coordinate::new(51.55, -0.05).unwrap();
    for &num_points in &[1_000usize, 10_000, 100_000] {
        let path = generate_path(num_points, 51.5, -0.1);
        group.throughput(Throughput::Elements(num_points as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_points), &path, |b, path| {
            b.iter(|| geometry::best_insertion_index(black_box(path), black_box(point)));
        });
    }

    group.finish();
}

// ============================================================================
// Store Benchmarks
// ============================================================================

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(20);

    // 1000 links with 500 points each
    let paths: Vec<Vec<Coordinate>> = (0..1_000)
        .map(|i| generate_path(500, 40.0 + (i % 10) as f64 * 0.1, -3.7 + (i / 10) as f64 * 0.01))
        .collect();

    group.throughput(Throughput::Elements(paths.len() as u64));
    group.bench_function("upsert_1k_links", |b| {
        b.iter(|| {
            let store = PathStore::new();
            for (i, points) in paths.iter().enumerate() {
                store
                    .upsert_computed(LinkId::new(format!("link-{i}")), points.clone())
                    .unwrap();
            }
            store
        });
    });

    let store = PathStore::new();
    for (i, points) in paths.iter().enumerate() {
        store
            .upsert_computed(LinkId::new(format!("link-{i}")), points.clone())
            .unwrap();
    }
    group.bench_function("snapshot_1k_links", |b| {
        b.iter(|| store.snapshot());
    });
    group.bench_function("total_distance_1k_links", |b| {
        b.iter(|| store.total_distance_meters());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_path_length, bench_best_insertion_index, bench_store);

criterion_main!(benches);
