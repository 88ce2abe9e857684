//! Criterion benches for the double description.
//!
//! - F2V: random symmetric halfspaces in 3D and 4D (8–32 pairs).
//! - V2F: hulls of sphere clouds (20–200 points).
//!
//! Results live under `target/criterion`.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use polycert::dd::{DdBuildF2V, DdBuildV2F};
use polycert::facet::{CollectFacets, DuplicateAction};
use polycert::rand::{sphere_cloud, HalfspaceGenerator, HalfspaceParams};

fn bench_f2v(c: &mut Criterion) {
    let mut group = c.benchmark_group("f2v");
    for (dim, directions) in [(3, 8), (3, 32), (4, 8), (4, 16)] {
        let params = HalfspaceParams { dim, directions, radius_min: 0.5, radius_max: 1.0 };
        let sample = HalfspaceGenerator::generate_single(&params, 17).unwrap();
        let mut facets = CollectFacets::new(dim);
        for (row, rhs) in &sample.rows {
            facets.insert(row.clone(), *rhs, false, DuplicateAction::MinRhs);
        }
        group.bench_function(BenchmarkId::new(format!("{dim}d"), directions), |b| {
            b.iter_batched(
                || DdBuildF2V::new(dim, &sample.bbox, &facets, true),
                |mut dd| {
                    for f in facets.iter() {
                        dd.add_facet(f);
                    }
                    dd.vertices().len()
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_v2f(c: &mut Criterion) {
    let mut group = c.benchmark_group("v2f");
    for (dim, count) in [(3, 20), (3, 200), (4, 50)] {
        let pts = sphere_cloud(dim, count, 1.0, 5).unwrap();
        group.bench_function(BenchmarkId::new(format!("{dim}d"), count), |b| {
            b.iter(|| {
                let mut dd = DdBuildV2F::new(1, &pts[0]);
                for (i, p) in pts.iter().enumerate().skip(1) {
                    dd.add_point(i + 1, p);
                }
                dd.facets().nb_facets()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_f2v, bench_v2f);
criterion_main!(benches);
