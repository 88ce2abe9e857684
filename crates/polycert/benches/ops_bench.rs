//! Criterion benches for polytope set operations: meet, union, affine
//! image and minimization, with both engines.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use polycert::interval::{Interval, IntervalMatrix, IntervalVector};
use polycert::polytope::{Engine, Polytope};
use polycert::rand::{sphere_cloud, HalfspaceGenerator, HalfspaceParams};
use polycert::Matrix;

fn bench_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("ops");
    let params = HalfspaceParams { dim: 3, directions: 12, radius_min: 0.5, radius_max: 1.0 };
    let a = HalfspaceGenerator::generate_single(&params, 1).unwrap();
    let b = HalfspaceGenerator::generate_single(&params, 2).unwrap();

    for engine in [Engine::Dd, Engine::Lp] {
        let name = format!("{engine:?}");
        group.bench_function(BenchmarkId::new("minimize", &name), |bch| {
            bch.iter_batched(
                || a.to_polytope(false).with_engine(engine),
                |p| {
                    p.minimize_constraints();
                    p.nb_facets()
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(BenchmarkId::new("meet_then_empty", &name), |bch| {
            bch.iter_batched(
                || (a.to_polytope(false).with_engine(engine), b.to_polytope(false)),
                |(mut p, q)| {
                    p &= &q;
                    p.is_empty(true)
                },
                BatchSize::SmallInput,
            )
        });
    }

    let pa = Polytope::from_vertices(&sphere_cloud(3, 40, 1.0, 11).unwrap());
    let pb = Polytope::from_vertices(&sphere_cloud(3, 40, 1.0, 12).unwrap());
    group.bench_function("union", |bch| {
        bch.iter(|| Polytope::union_of_polytopes(&[pa.clone(), pb.clone()]))
    });
    let m = IntervalMatrix::from_matrix(&Matrix::from_row_slice(3, 3, &[1.0, 0.2, 0.0, 0.0, 1.0, 0.3, 0.1, 0.0, 1.0]));
    let shift = IntervalVector::constant(3, Interval::point(0.5));
    group.bench_function("direct_affine", |bch| bch.iter(|| pa.direct_affine_transform(&m, &shift)));
    group.bench_function("inflate_ball", |bch| {
        bch.iter_batched(
            || pa.clone(),
            |mut p| {
                p.inflate_ball(0.1);
                p.bbox(true)
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_ops);
criterion_main!(benches);
