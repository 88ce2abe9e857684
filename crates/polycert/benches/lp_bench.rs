//! Criterion benches for the certified LP: bound, emptiness and
//! minimization on random symmetric halfspaces.

use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use polycert::facet::{CollectFacets, DuplicateAction};
use polycert::lp::LpClp;
use polycert::rand::{HalfspaceGenerator, HalfspaceParams};
use polycert::Vector;

fn sample_lp(dim: usize, directions: usize) -> LpClp {
    let params = HalfspaceParams { dim, directions, radius_min: 0.5, radius_max: 1.0 };
    let sample = HalfspaceGenerator::generate_single(&params, 3).unwrap();
    let mut facets = CollectFacets::new(dim);
    for (row, rhs) in &sample.rows {
        facets.insert(row.clone(), *rhs, false, DuplicateAction::MinRhs);
    }
    LpClp::new(dim, Rc::new(facets), &sample.bbox)
}

fn bench_lp(c: &mut Criterion) {
    let mut group = c.benchmark_group("lp");
    for (dim, directions) in [(3, 10), (6, 20)] {
        let id = format!("{dim}d-{directions}");
        group.bench_function(BenchmarkId::new("bound", &id), |b| {
            b.iter_batched(
                || sample_lp(dim, directions).with_objective(Vector::from_element(dim, 1.0)),
                |mut lp| lp.solve(false),
                BatchSize::SmallInput,
            )
        });
        group.bench_function(BenchmarkId::new("emptiness", &id), |b| {
            b.iter_batched(|| sample_lp(dim, directions), |mut lp| lp.check_emptiness(), BatchSize::SmallInput)
        });
        group.bench_function(BenchmarkId::new("minimize", &id), |b| {
            b.iter_batched(
                || sample_lp(dim, directions),
                |mut lp| lp.minimize_polytope(polycert::interval::Interval::ZERO, false, true),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lp);
criterion_main!(benches);
