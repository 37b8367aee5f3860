// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Spatial index and consolidation benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshgroup::geometry::{BoundingBox, Facet, Mesh};
use nalgebra::Point3;

/// Regular grid of `n * n` quads (two triangles each) in the z = 0 plane.
fn grid(n: u32) -> Vec<Facet<f64>> {
    let mut facets = Vec::with_capacity((2 * n * n) as usize);
    for i in 0..n {
        for j in 0..n {
            let (x, y) = (f64::from(i), f64::from(j));
            let id = 2 * (i * n + j);
            facets.push(Facet::new(
                [
                    Point3::new(x, y, 0.0),
                    Point3::new(x + 1.0, y, 0.0),
                    Point3::new(x, y + 1.0, 0.0),
                ],
                id,
            ));
            facets.push(Facet::new(
                [
                    Point3::new(x + 1.0, y, 0.0),
                    Point3::new(x + 1.0, y + 1.0, 0.0),
                    Point3::new(x, y + 1.0, 0.0),
                ],
                id + 1,
            ));
        }
    }
    facets
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for n in [16u32, 64, 128] {
        let facets = grid(n);
        group.bench_with_input(BenchmarkId::new("mesh", facets.len()), &facets, |b, facets| {
            b.iter(|| Mesh::from_facets(black_box(facets), 1e-10));
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let mesh = Mesh::from_facets(&grid(128), 1e-10);
    let query = BoundingBox::from_corners(Point3::new(30.0, 30.0, -1.0), Point3::new(40.0, 40.0, 1.0));

    group.bench_function("search_indexed", |b| {
        b.iter(|| mesh.search(black_box(&query), false).len());
    });

    group.bench_function("search_linear", |b| {
        b.iter(|| mesh.linear_search(black_box(&query), false).len());
    });

    group.bench_function("nearest_indexed", |b| {
        b.iter(|| mesh.nearest(black_box(&Point3::new(64.3, 12.7, 0.5))).map(|t| t.id()));
    });

    group.bench_function("nearest_linear", |b| {
        b.iter(|| mesh.linear_nearest(black_box(&Point3::new(64.3, 12.7, 0.5))).map(|t| t.id()));
    });

    group.finish();
}

fn bench_motion(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion");

    let facets = grid(64);
    group.bench_function("translate_rebuild", |b| {
        let mut mesh = Mesh::from_facets(&facets, 1e-10);
        let offset = nalgebra::Vector3::new(0.01, 0.0, 0.0);
        b.iter(|| {
            mesh.translate(black_box(&offset));
            mesh.rebuild()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_queries, bench_motion);
criterion_main!(benches);
