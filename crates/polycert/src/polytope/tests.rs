use super::*;
use crate::interval::BoolInterval;
use nalgebra::{dmatrix, dvector};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn unit_box(n: usize) -> IntervalVector {
    IntervalVector::constant(n, Interval::new(0.0, 1.0))
}

/// `[0, 1]²` cut by `x + y ≤ 1.5`.
fn cut_square() -> Polytope {
    Polytope::from_facets(&unit_box(2), &[(dvector![1.0, 1.0], 1.5)], false)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6
}

fn has_vertex(p: &Polytope, q: &[f64]) -> bool {
    p.vertices()
        .iter()
        .any(|v| v.iter().zip(q).all(|(x, &c)| x.inflate(1e-9).contains(c)))
}

#[test]
fn square_cut_by_half_plane() {
    let mut p = Polytope::from_box(&unit_box(2));
    assert!(p.add_constraint(dvector![1.0, 1.0], 0.5, 0.0));
    assert!(!p.is_empty(true));
    let b = p.bbox(true);
    for i in 0..2 {
        assert!(b[i].inflate(1e-9).contains(0.0));
        assert!(b[i].inflate(1e-9).contains(0.5));
        assert!(b[i].ub() <= 0.5 + 1e-9);
    }
    assert_eq!(p.vertices().len(), 3);
    for q in [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5]] {
        assert!(has_vertex(&p, &q), "missing vertex {q:?}");
    }
}

#[test]
fn infeasible_half_plane_is_caught_by_fast_bound() {
    let mut p = Polytope::from_box(&unit_box(2)).with_engine(Engine::Lp);
    assert!(p.add_constraint(dvector![1.0, 1.0], -1.0, 0.0));
    assert!(p.is_empty(false));
    assert!(!p.state().contains(PolState::CLP_READY));
    assert_eq!(p.nb_facets(), None);
    assert!(p.mid().iter().all(|x| x.is_nan()));
}

#[test]
fn redundant_constraint_is_not_added() {
    let mut p = cut_square();
    assert!(!p.add_constraint(dvector![1.0, 1.0], 3.0, 0.0));
    assert!(!p.add_constraint(dvector![1.0, 0.0], 1.0, 0.0));
    assert!(!p.add_constraint(Vector::zeros(2), -1e-12, 1e-9));
    assert_eq!(p.nb_facets(), Some(5));
}

#[test]
fn coordinate_constraint_moves_into_the_box() {
    let mut p = cut_square();
    p.vertices();
    assert!(p.state().contains(PolState::F2V_READY));
    assert!(p.add_constraint(dvector![-2.0, 0.0], -1.0, 0.0));
    assert_eq!(p.facets().nb_facets(), 1);
    assert_eq!(p.bbox(false)[0].lb(), 0.5);
    assert_eq!(p.vertices().len(), 4);
    assert!(has_vertex(&p, &[1.0, 0.5]));
}

#[test]
fn cube_box_and_hull_agree() {
    let p = Polytope::from_box(&unit_box(3));
    assert_eq!(p.nb_facets(), Some(6));
    assert_eq!(p.vertices().len(), 8);
    let corners: Vec<Vector> = (0..8)
        .map(|k| dvector![(k & 1) as f64, ((k >> 1) & 1) as f64, ((k >> 2) & 1) as f64])
        .collect();
    let q = Polytope::from_vertices(&corners);
    assert_eq!(q.nb_facets(), Some(6));
    assert_eq!(q.facets().nb_facets(), 0);
    assert_eq!(q.vertices().len(), 8);
    assert!(q.is_subset(&p, false));
}

#[test]
fn containment_and_intersection_of_boxes() {
    let p = cut_square();
    let inside = IntervalVector::constant(2, Interval::new(0.1, 0.2));
    let corner = IntervalVector::constant(2, Interval::new(0.9, 1.0));
    let straddle = IntervalVector::constant(2, Interval::new(0.6, 0.9));
    assert_eq!(p.contains(&inside), BoolInterval::True);
    assert_eq!(p.contains(&corner), BoolInterval::False);
    assert_eq!(p.contains(&straddle), BoolInterval::False);
    assert_eq!(p.intersects(&inside), BoolInterval::True);
    assert_eq!(p.intersects(&corner), BoolInterval::False);
    assert_eq!(p.intersects(&straddle), BoolInterval::True);
    assert_eq!(p.contains(&IntervalVector::empty(2)), BoolInterval::True);
}

#[test]
fn subset_between_polytopes() {
    let p = cut_square();
    let small = Polytope::from_box(&IntervalVector::constant(2, Interval::new(0.1, 0.6)));
    assert!(small.is_subset(&p, false));
    assert!(!p.is_subset(&small, true));
    let square = Polytope::from_box(&unit_box(2));
    assert!(p.is_subset(&square, false));
    assert!(!square.is_subset(&p, true));
    assert!(Polytope::empty(2).is_subset(&small, false));
}

#[test]
fn bound_and_distance() {
    let p = cut_square();
    assert!(close(p.bound_row(&dvector![1.0, 2.0]), 2.5));
    assert!(close(p.bound_row(&dvector![1.0, 1.0]), 1.5));
    assert_eq!(p.bound_row(&dvector![-1.0, 0.0]), 0.0);
    let fc = crate::facet::Facet::new(dvector![1.0, 1.0], 1.0, false);
    assert!(close(p.distance_cst(&fc), 0.5));
    let half = Polytope::from_box(&IntervalVector::from_bounds(&[0.0, 0.0], &[f64::INFINITY, 1.0]));
    assert_eq!(half.bound_row(&dvector![1.0, 0.0]), f64::INFINITY);
    assert_eq!(Polytope::empty(2).bound_row(&dvector![1.0, 0.0]), f64::NEG_INFINITY);
}

#[test]
fn fast_bound_uses_neighbouring_facets() {
    let p = cut_square();
    let b = p.fast_bound(&crate::facet::FacetBase::new(dvector![1.0, 1.0]));
    assert_eq!(b.ub(), 1.5);
    let null = p.fast_bound(&crate::facet::FacetBase::new(Vector::zeros(2)));
    assert_eq!(null, Interval::ZERO);
}

#[test]
fn equality_makes_the_polytope_flat() {
    let mut p = Polytope::from_box(&unit_box(2));
    assert!(!p.is_flat());
    assert_eq!(p.add_equality(dvector![1.0, -1.0], 0.0), Update::Changed);
    assert!(p.is_flat());
    assert_eq!(p.nb_eq_facets(), Some(1));
    assert_eq!(p.vertices().len(), 2);
    assert!(has_vertex(&p, &[1.0, 1.0]));
    assert_eq!(p.add_equality(dvector![0.0, 0.0], 1.0), Update::Empty);
    assert!(p.is_empty(false));
}

#[test]
fn coordinate_equality_flattens_the_box() {
    let mut p = cut_square();
    assert_eq!(p.add_equality(dvector![2.0, 0.0], 1.0), Update::Changed);
    assert_eq!(p.bbox(false)[0], Interval::point(0.5));
    assert_eq!(p.nb_eq_facets(), Some(1));
    assert!(close(p.component(1).ub(), 1.0));
    assert_eq!(p.add_equality(dvector![1.0, 0.0], 2.0), Update::Empty);
}

#[test]
fn meet_with_box_and_polytope() {
    let mut p = cut_square();
    p.vertices();
    let b = IntervalVector::from_bounds(&[0.5, 0.0], &[2.0, 2.0]);
    assert_eq!(p.meet_with_box(&b), Update::Changed);
    assert_eq!(p.vertices().len(), 4);
    assert_eq!(p.meet_with_box(&unit_box(2)), Update::Unchanged);

    let mut q = Polytope::from_box(&unit_box(2));
    let other = Polytope::from_facets(&unit_box(2), &[(dvector![-1.0, 1.0], 0.0)], false);
    q &= &other;
    q &= &cut_square();
    assert_eq!(q.facets().nb_facets(), 2);
    assert_eq!(q.vertices().len(), 4);
    assert!(has_vertex(&q, &[0.75, 0.75]));

    let far = Polytope::from_box(&IntervalVector::constant(2, Interval::new(5.0, 6.0)));
    q &= &far;
    assert!(q.is_empty(false));
}

#[test]
fn union_is_the_hull() {
    let a = Polytope::from_box(&unit_box(2));
    let b = Polytope::from_box(&IntervalVector::from_bounds(&[2.0, 0.0], &[3.0, 1.0]));
    let u = Polytope::union_of_polytopes(&[a.clone(), b.clone()]).expect("non-empty list");
    let bb = u.bbox(true);
    assert!(close(bb[0].lb(), 0.0) && close(bb[0].ub(), 3.0));
    assert_eq!(u.vertices().len(), 4);
    assert!(Polytope::union_of_polytopes(&[]).is_none());

    let mut j = a.clone();
    j |= &b;
    assert!(b.is_subset(&j, true));
    assert_eq!(j.join_with_polytope(&a), Update::Unchanged);

    let line = Polytope::from_box(&IntervalVector::from_bounds(&[0.0, 0.0], &[f64::INFINITY, 1.0]));
    let ub = Polytope::union_of_polytopes(&[a, line]).expect("non-empty list");
    assert!(ub.bbox(false)[0].is_unbounded());
}

#[test]
fn homothety_scales_around_the_center() {
    let mut p = cut_square();
    p.homothety(&IntervalVector::zeros(2), 2.0);
    assert!(close(p.bound_row(&dvector![1.0, 1.0]), 3.0));
    assert!(close(p.component(0).ub(), 2.0));
}

#[test]
fn inflations() {
    let mut p = cut_square();
    p.inflate(0.5);
    assert!(close(p.bound_row(&dvector![1.0, 1.0]), 2.5));
    assert!(close(p.component(0).lb(), -0.5));

    let mut q = cut_square();
    q.inflate_ball(0.5);
    assert!(close(q.bound_row(&dvector![1.0, 1.0]), 1.5 + 0.5 * 2f64.sqrt()));

    let mut flat = Polytope::from_box(&unit_box(2));
    flat.add_equality(dvector![1.0, -1.0], 0.0);
    flat.unflat(0, 0.25);
    assert!(!flat.is_flat());
    assert_eq!(flat.nb_eq_facets(), Some(0));
    assert!(close(flat.bound_row(&dvector![1.0, -1.0]), 0.25));
}

#[test]
fn section_by_hyperplane() {
    let p = cut_square();
    let s = p.meet_with_hyperplane(0, 0.75);
    assert!(s.is_flat());
    assert!(close(s.component(1).ub(), 0.75));
    assert!(p.meet_with_hyperplane(0, 3.0).is_empty(false));
}

#[test]
fn affine_maps_agree() {
    let p = cut_square();
    let m = IntervalMatrix::from_matrix(&dmatrix![2.0, 0.0; 0.0, 1.0]);
    let minv = IntervalMatrix::from_matrix(&dmatrix![0.5, 0.0; 0.0, 1.0]);
    let t = IntervalVector::from_point(&dvector![1.0, 0.0]);
    let row = dvector![0.5, 1.0];
    let bij = p.bijective_affine_transform(&m, &minv, &t);
    assert!(close(bij.bound_row(&row), 2.0));
    assert!(close(bij.component(0).lb(), 1.0));
    let direct = p.direct_affine_transform(&m, &t);
    assert!(close(direct.bound_row(&row), 2.0));
    assert!(close(direct.component(0).ub(), 3.0));
    assert_eq!(direct.vertices().len(), 5);
}

#[test]
fn preimage_into_a_larger_space() {
    // (x, y, z) ↦ x + y must stay in [0, 1]
    let seg = Polytope::from_box(&IntervalVector::constant(1, Interval::new(0.0, 1.0)));
    let m = IntervalMatrix::from_matrix(&dmatrix![1.0, 1.0, 0.0]);
    let pre = seg.reverse_affine_transform(&m, &IntervalVector::zeros(1), &IntervalVector::constant(3, Interval::new(-1.0, 1.0)));
    assert_eq!(pre.dim(), 3);
    assert!(close(pre.bound_row(&dvector![1.0, 1.0, 0.0]), 1.0));
    assert!(close(pre.bound_row(&dvector![-1.0, -1.0, 0.0]), 0.0));
    assert!(close(pre.bound_row(&dvector![0.0, 0.0, 1.0]), 1.0));
}

#[test]
fn interval_preimage_keeps_every_solution() {
    // m·x ∈ [0, 1] for some m ∈ [0.5, 1] iff x ∈ [0, 2]
    let seg = Polytope::from_box(&IntervalVector::constant(1, Interval::new(0.0, 1.0)));
    let m = IntervalMatrix::from_fn(1, 1, |_, _| Interval::new(0.5, 1.0));
    let bbox = IntervalVector::constant(1, Interval::new(-3.0, 3.0));
    let pre = seg.reverse_affine_transform(&m, &IntervalVector::zeros(1), &bbox);
    assert!(!pre.is_empty(true));
    assert!(pre.bound_row(&dvector![1.0]) >= 2.0);
    assert!(pre.bound_row(&dvector![-1.0]) >= 0.0);
    assert!(pre.bound_row(&dvector![1.0]) <= 3.0);
    for x in [0.0, 0.7, 1.5, 2.0] {
        assert_eq!(pre.contains(&IntervalVector::constant(1, Interval::point(x))), BoolInterval::True, "{x}");
    }
}

#[test]
fn time_elapse_and_sum() {
    let sq = Polytope::from_box(&unit_box(2));
    let swept = sq.time_elapse(&IntervalVector::from_point(&dvector![1.0, 0.0]), Interval::new(0.0, 1.0));
    assert!(close(swept.component(0).ub(), 2.0));
    assert_eq!(swept.vertices().len(), 4);

    let tri = Polytope::from_vertices(&[dvector![0.0, 0.0], dvector![1.0, 0.0], dvector![0.0, 1.0]]);
    let sum = &tri + &sq;
    assert!(close(sum.bound_row(&dvector![1.0, 1.0]), 3.0));
    assert!(close(sum.bound_row(&dvector![-1.0, -1.0]), 0.0));
    assert_eq!(sum.vertices().len(), 5);
}

#[test]
fn parallelepiped_and_zonotope() {
    let par = Parallelepiped::new(dvector![0.0, 0.0], dmatrix![1.0, 0.5; 0.0, 1.0]);
    let p = Polytope::from_parallelepiped(&par);
    assert_eq!(p.vertices().len(), 4);
    for c in par.vertices() {
        assert!(p.vertices().iter().any(|v| v.inflate(1e-6).contains(&c)));
    }
    let zon = Zonotope::new(dvector![0.0, 0.0], dmatrix![1.0, 0.0, 1.0; 0.0, 1.0, 1.0]);
    let z = Polytope::from_zonotope(&zon);
    assert_eq!(z.vertices().len(), 6);
    assert!(close(z.bound_row(&dvector![1.0, 1.0]), 4.0));
}

#[test]
fn lp_engine_agrees_with_enumeration() {
    let rows = [(dvector![1.0, 1.0], 1.5), (dvector![1.0, -1.0], 0.5), (dvector![1.0, 0.2], 1.15)];
    let dd = Polytope::from_facets(&unit_box(2), &rows, false);
    let lp = Polytope::from_facets(&unit_box(2), &rows, false).with_engine(Engine::Lp);
    assert!(!lp.is_empty(true));
    for row in [dvector![1.0, 2.0], dvector![-1.0, 0.3], dvector![0.0, 1.0]] {
        let (a, b) = (dd.bound_row(&row), lp.bound_row(&row));
        assert!(close(a, b), "{a} vs {b}");
    }
    dd.minimize_constraints();
    lp.minimize_constraints();
    assert_eq!(dd.nb_facets(), lp.nb_facets());
    assert!(close(lp.component(0).ub(), 1.0));

    let empty = Polytope::from_facets(
        &unit_box(2),
        &[(dvector![1.0, 2.0], 1.0), (dvector![-2.0, -1.0], -2.5)],
        false,
    )
    .with_engine(Engine::Lp);
    assert!(empty.is_empty(true));
}

#[test]
fn clear_display_and_clone() {
    let mut p = cut_square();
    let q = p.clone();
    assert!(Rc::ptr_eq(&p.facets(), &q.facets()));
    p.add_constraint(dvector![1.0, 2.0], 1.0, 0.0);
    assert!(!Rc::ptr_eq(&p.facets(), &q.facets()));
    assert_eq!(q.facets().nb_facets(), 1);
    assert!(format!("{q}").contains("EndPolytope"));
    assert!(format!("{}", Polytope::empty(3)).contains("empty dim 3"));
    p.clear();
    assert_eq!(p.bbox(false), IntervalVector::zeros(2));
    assert!(!p.is_empty(true));
}

#[test]
fn idempotent_minimization_on_circle_clouds() {
    for seed in 0..6 {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = rng.gen_range(5..12);
        let pts: Vec<Vector> = (0..n)
            .map(|k| {
                let t = std::f64::consts::TAU * (k as f64 + rng.gen_range(0.0..0.5)) / n as f64;
                dvector![t.cos(), t.sin()]
            })
            .collect();
        let hull = Polytope::from_vertices(&pts);
        let mut cf = (*hull.facets()).clone();
        cf.insert(dvector![1.0, 1.0], 10.0, false, crate::facet::DuplicateAction::KeepRhs);
        let p = Polytope::from_collect_facets(&hull.bbox(false), cf);
        p.minimize_constraints();
        assert!(p.facets().nb_facets() <= hull.facets().nb_facets(), "seed {seed}");
        let q = Polytope::from_collect_facets(&p.bbox(false), (*p.facets()).clone());
        q.minimize_constraints();
        assert_eq!(p.nb_facets(), q.nb_facets(), "seed {seed}");
        assert_eq!(p.vertices().len(), q.vertices().len(), "seed {seed}");
    }
}

/// `count` cuts with entries in `{-1, 0, 1}`, two of them at least
/// nonzero, and `rhs ∈ {1, 2}`. On the unit box they meet at many
/// degenerate vertices and always keep a neighbourhood of `0.1·𝟙`.
fn integer_cuts(rng: &mut StdRng, dim: usize, count: usize) -> Vec<(Vector, f64)> {
    let mut cuts = Vec::with_capacity(count);
    while cuts.len() < count {
        let row = Vector::from_fn(dim, |_, _| rng.gen_range(-1i32..=1) as f64);
        if row.iter().filter(|x| **x != 0.0).count() < 2 {
            continue;
        }
        cuts.push((row, rng.gen_range(1i32..=2) as f64));
    }
    cuts
}

#[test]
fn lp_minimization_matches_enumeration_on_pair_cuts() {
    // x₀ + x₁ + x₂ ≤ 1 leaves the pair cuts on {0, 1, 2} touching only
    // lower faces; the sum cut is strictly implied
    let mut rows: Vec<(Vector, f64)> = Vec::new();
    for i in 0..4 {
        for j in i + 1..4 {
            let mut row = Vector::zeros(4);
            row[i] = 1.0;
            row[j] = 1.0;
            rows.push((row, 1.0));
        }
    }
    rows.push((dvector![1.0, 1.0, 1.0, 0.0], 1.0));
    rows.push((dvector![1.0, 1.0, 1.0, 1.0], 2.0));
    let dd = Polytope::from_facets(&unit_box(4), &rows, false);
    let lp = Polytope::from_facets(&unit_box(4), &rows, false).with_engine(Engine::Lp);
    for row in [dvector![1.0, 0.0, 0.0, 0.0], dvector![1.0, 1.0, 1.0, 1.0], dvector![2.0, 1.0, -1.0, 3.0]] {
        let (a, b) = (dd.bound_row(&row), lp.bound_row(&row));
        assert!(close(a, b), "{a} vs {b} for {row}");
    }
    dd.minimize_constraints();
    lp.minimize_constraints();
    assert_same_facets(&dd, &lp);
}

/// Same number of constraints and the same facets, up to the rhs rounding.
fn assert_same_facets(dd: &Polytope, lp: &Polytope) {
    assert_eq!(dd.nb_facets(), lp.nb_facets());
    let (fd, fl) = (dd.facets(), lp.facets());
    for f in fd.iter() {
        let found = fl
            .iter()
            .any(|g| g.is_eq() == f.is_eq() && (g.row() - f.row()).amax() < 1e-12 && close(g.rhs(), f.rhs()));
        assert!(found, "facet {} ≤ {} kept by enumeration only", f.row(), f.rhs());
    }
}

proptest! {
    #[test]
    fn prop_lp_and_enumeration_agree_on_integer_cuts(seed in 0u64..10_000, dim in 3usize..=4, count in 2usize..9) {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = integer_cuts(&mut rng, dim, count);
        let dd = Polytope::from_facets(&unit_box(dim), &rows, false);
        let lp = Polytope::from_facets(&unit_box(dim), &rows, false).with_engine(Engine::Lp);
        for _ in 0..4 {
            let c = Vector::from_fn(dim, |_, _| rng.gen_range(-3i32..=3) as f64);
            let (a, b) = (dd.bound_row(&c), lp.bound_row(&c));
            prop_assert!(close(a, b), "{} vs {} for {}", a, b, c);
        }
    }

    #[test]
    fn prop_lp_and_enumeration_keep_the_same_facets(seed in 0u64..10_000, dim in 3usize..=4, count in 2usize..9) {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = integer_cuts(&mut rng, dim, count);
        let dd = Polytope::from_facets(&unit_box(dim), &rows, true);
        let lp = Polytope::from_facets(&unit_box(dim), &rows, false).with_engine(Engine::Lp);
        lp.minimize_constraints();
        prop_assert_eq!(dd.nb_facets(), lp.nb_facets());
        assert_same_facets(&dd, &lp);
    }

    #[test]
    fn prop_containment_is_monotone(
        a in 0.0f64..0.8, w in 0.01f64..0.2, b in 0.0f64..0.8, h in 0.01f64..0.2,
        s in 0.0f64..1.0, t in 0.0f64..1.0,
    ) {
        let p = cut_square();
        let big = IntervalVector::from_bounds(&[a, b], &[a + w, b + h]);
        let small = IntervalVector::from_bounds(&[a + s * w * 0.5, b + t * h * 0.5], &[a + w * (0.5 + 0.5 * s), b + h * (0.5 + 0.5 * t)]);
        prop_assume!(small.is_subset(&big));
        if p.contains(&big) == BoolInterval::True {
            prop_assert_eq!(p.contains(&small), BoolInterval::True);
        }
        if p.intersects(&small) == BoolInterval::True {
            prop_assert!(p.intersects(&big) != BoolInterval::False);
        }
    }

    #[test]
    fn prop_box_round_trip(lo in prop::collection::vec(-10.0f64..10.0, 3), w in prop::collection::vec(0.0f64..5.0, 3)) {
        let hi: Vec<f64> = lo.iter().zip(&w).map(|(l, d)| l + d).collect();
        let b = IntervalVector::from_bounds(&lo, &hi);
        let p = Polytope::from_box(&b);
        let t = p.bbox(true);
        prop_assert!(t.is_subset(&b));
        prop_assert!(b.is_subset(&t));
    }

    #[test]
    fn prop_nonempty_has_sound_vertices(a in -1.0f64..1.0, b in -1.0f64..1.0, c in -1.0f64..1.5) {
        let mut p = Polytope::from_box(&unit_box(2));
        p.add_constraint(dvector![a, b], c, 0.0);
        if !p.is_empty(true) {
            let vs = p.vertices();
            prop_assert!(!vs.is_empty());
            for v in vs {
                let m = v.mid();
                prop_assert!(a * m[0] + b * m[1] <= c + 1e-7);
                prop_assert!(unit_box(2).inflate(1e-9).contains(&m));
            }
        }
    }

    #[test]
    fn prop_lp_never_contradicts_enumeration(a in -1.0f64..1.0, b in -1.0f64..1.0, c in -1.0f64..1.5, d in -1.0f64..1.0) {
        let rows = [(dvector![a, b], c), (dvector![d, 1.0], 0.8)];
        let dd = Polytope::from_facets(&unit_box(2), &rows, false);
        let lp = Polytope::from_facets(&unit_box(2), &rows, false).with_engine(Engine::Lp);
        prop_assert_eq!(dd.is_empty(true), lp.is_empty(true));
    }
}
