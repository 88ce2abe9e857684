use super::*;
use crate::interval::{Interval, IntervalVector};
use crate::polytope::Polytope;
use nalgebra::{dmatrix, dvector};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

fn unit_square() -> IntervalVector {
    IntervalVector::constant(2, Interval::new(0.0, 1.0))
}

fn lp_on_square(rows: &[(Vector, f64, bool)]) -> LpClp {
    let mut lp = LpClp::new(2, Rc::new(CollectFacets::new(2)), &unit_square());
    for (row, rhs, eq) in rows {
        assert!(lp.add_constraint(row.clone(), *rhs, *eq).is_some());
    }
    lp
}

#[test]
fn status_flags_combine_and_print() {
    let st = LpStatus::NOTEMPTY | LpStatus::BOUNDED;
    assert!(st.contains(LpStatus::NOTEMPTY));
    assert!(!st.contains(LpStatus::EMPTY));
    assert!(!st.is_error());
    assert_eq!(st.to_string(), "NonEmpty-Bounded");
    assert_eq!(LpStatus::EMPTY.to_string(), "Empty");
    assert_eq!((LpStatus::EMPTY | LpStatus::EMPTY_BBOX).to_string(), "Empty(bbox)");
    assert_eq!(LpStatus::CHANGED.to_string(), "Not_computed");
    let mut st = LpStatus::NONE;
    st |= LpStatus::ERROR_DUAL_CHECK;
    assert!(st.is_error());
}

#[test]
fn square_is_not_empty() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 1.5, false)]);
    let st = lp.solve(true);
    assert!(st.contains(LpStatus::NOTEMPTY), "{st:?}");
    assert!(!st.contains(LpStatus::EMPTY));
    assert!(!lp.check_emptiness());
    let p = lp.feasible_point();
    assert!(p.is_subset(&unit_square()));
    assert!(p.dot_row(&dvector![1.0, 1.0]).ub() <= 1.5);
}

#[test]
fn contradictory_bounds_are_proved_empty() {
    let mut lp = LpClp::from_rows(&dmatrix![1.0; -1.0], &dvector![0.0, -1.0], &[]);
    let st = lp.solve(true);
    assert!(st.contains(LpStatus::EMPTY), "{st:?}");
    assert!(!st.intersects(LpStatus::NOTEMPTY | LpStatus::NOTEMPTY_APPROX));
    assert!(lp.valobj().is_empty());
    // both constraints take part in the certificate
    let y = lp.empty_row();
    assert!(y[0].lb() > 0.0 && y[1].lb() > 0.0);
}

#[test]
fn infeasible_bounding_falls_back_to_emptiness() {
    let mut lp = LpClp::from_rows(&dmatrix![1.0; -1.0], &dvector![0.0, -1.0], &[]).with_objective(dvector![1.0]);
    assert!(lp.solve(false).contains(LpStatus::EMPTY));
}

#[test]
fn bound_of_a_cut_square() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 1.5, false)]).with_objective(dvector![1.0, 1.0]);
    let st = lp.solve(false);
    assert!(st.contains(LpStatus::BOUNDED), "{st:?}");
    assert!(st.contains(LpStatus::NOTEMPTY));
    let v = lp.valobj();
    assert!(v.contains(1.5));
    assert!(v.diam() < 1e-9);
    assert!(lp.bounded_row()[0].contains(1.0));
}

#[test]
fn bound_uses_the_box_when_no_row_binds() {
    let mut lp = lp_on_square(&[(dvector![1.0, 2.0], 4.0, false)]).with_objective(dvector![1.0, 1.0]);
    assert!(lp.solve(false).contains(LpStatus::BOUNDED));
    assert!(lp.valobj().contains(2.0));
    assert!(lp.valobj().ub() < 2.0 + 1e-9);
}

#[test]
fn equality_rows_are_honoured() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 1.0, true)]).with_objective(dvector![1.0, 0.0]);
    let st = lp.solve(false);
    assert!(st.contains(LpStatus::BOUNDED), "{st:?}");
    assert!((lp.valobj().ub() - 1.0).abs() < 1e-9);
    let st = lp.solve(true);
    assert!(!st.contains(LpStatus::EMPTY));
    assert!(st.intersects(LpStatus::NOTEMPTY | LpStatus::NOTEMPTY_APPROX));
}

#[test]
fn equality_outside_the_box_is_empty() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 3.0, true)]);
    let st = lp.solve(true);
    assert!(st.contains(LpStatus::EMPTY), "{st:?}");
}

#[test]
fn half_line_is_unbounded() {
    let mut lp = LpClp::from_rows(&dmatrix![-1.0], &dvector![0.0], &[]).with_objective(dvector![1.0]);
    let st = lp.solve(false);
    assert!(st.contains(LpStatus::UNBOUNDED), "{st:?}");
    assert!(st.contains(LpStatus::NOTEMPTY));
    assert_eq!(lp.valobj().ub(), f64::INFINITY);
    assert!(lp.unbounded_vect()[0].lb() > 0.0);
}

#[test]
fn ray_needs_a_proved_feasible_point() {
    let st = with_ray(LpStatus::NOTEMPTY_APPROX, LpStatus::UNBOUNDED);
    assert!(st.contains(LpStatus::UNBOUNDED_APPROX), "{st:?}");
    assert!(!st.contains(LpStatus::UNBOUNDED));
    let st = with_ray(LpStatus::NOTEMPTY, LpStatus::UNBOUNDED);
    assert!(st.contains(LpStatus::NOTEMPTY | LpStatus::UNBOUNDED), "{st:?}");
    assert_eq!(
        with_ray(LpStatus::NOTEMPTY, LpStatus::UNBOUNDED_APPROX),
        LpStatus::NOTEMPTY | LpStatus::UNBOUNDED_APPROX
    );
}

/// `xᵢ + xⱼ ≤ 1` on every pair: most vertices of the cut cube are
/// degenerate.
fn pair_cuts(n: usize) -> Vec<(Vector, f64)> {
    let mut cuts = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            let mut row = Vector::zeros(n);
            row[i] = 1.0;
            row[j] = 1.0;
            cuts.push((row, 1.0));
        }
    }
    cuts
}

#[test]
fn degenerate_vertices_give_tight_bounds() {
    let bbox = IntervalVector::constant(4, Interval::new(0.0, 1.0));
    let mut cuts = pair_cuts(4);
    cuts.push((dvector![1.0, 1.0, 1.0, 0.0], 1.0));
    cuts.push((dvector![0.0, 1.0, 1.0, 1.0], 1.0));
    let dd = Polytope::from_facets(&bbox, &cuts, false);
    let mut lp = LpClp::new(4, Rc::new(CollectFacets::new(4)), &bbox);
    for (row, rhs) in &cuts {
        lp.add_constraint(row.clone(), *rhs, false);
    }
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..60 {
        let c = Vector::from_fn(4, |_, _| rng.gen_range(-2i32..=3) as f64);
        if c.iter().all(|x| *x == 0.0) {
            continue;
        }
        lp.set_objective(c.clone());
        let st = lp.solve(false);
        assert!(st.contains(LpStatus::NOTEMPTY | LpStatus::BOUNDED), "{st:?} for {c}");
        let exact = dd.bound_row(&c);
        let v = lp.valobj();
        assert!(v.inflate(1e-9).contains(exact), "{v} vs {exact} for {c}");
        assert!(v.ub() - exact < 1e-7, "loose bound {v} for {c}, exact {exact}");
    }
}

#[test]
fn deactivated_row_is_ignored() {
    let mut lp = lp_on_square(&[]).with_objective(dvector![1.0, 1.0]);
    let id = lp.add_constraint(dvector![1.0, 1.0], 0.5, false).unwrap();
    lp.solve(false);
    assert!(lp.valobj().ub() < 0.5 + 1e-9);
    lp.set_active(id, false);
    assert!(!lp.is_active(id));
    assert!(lp.solve(false).contains(LpStatus::BOUNDED));
    assert!(lp.valobj().contains(2.0));
}

#[test]
fn duplicate_constraint_is_rejected() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 1.5, false)]);
    assert_eq!(lp.add_constraint(dvector![1.0, 1.0], 1.0, false), None);
    assert_eq!(lp.facets().nb_facets(), 1);
}

#[test]
fn minimization_flags_the_implied_row() {
    let mut lp = lp_on_square(&[]);
    let far = lp.add_constraint(dvector![1.0, 2.0], 4.0, false).unwrap();
    let cut = lp.add_constraint(dvector![1.0, 1.0], 1.5, false).unwrap();
    assert_eq!(lp.minimize_polytope(Interval::ZERO, false, false), Some(1));
    assert!(lp.is_redundant(far));
    assert!(!lp.is_redundant(cut));
    assert!(lp.is_active(cut));
    assert_eq!(lp.redundant_ids(), vec![far]);
}

#[test]
fn minimization_of_an_empty_problem() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], -0.5, false)]);
    assert_eq!(lp.minimize_polytope(Interval::ZERO, true, false), None);
}

#[test]
fn box_is_tightened_by_the_constraints() {
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 0.5, false)]);
    assert_eq!(lp.minimize_box(), Update::Changed);
    for j in 0..2 {
        assert_eq!(lp.bbox()[j].lb(), 0.0);
        assert!((lp.bbox()[j].ub() - 0.5).abs() < 1e-12);
    }
    assert_eq!(lp.minimize_box(), Update::Unchanged);
}

#[test]
fn dependent_equalities() {
    let mut lp = LpClp::from_rows(&dmatrix![1.0, 1.0; 2.0, 2.0], &dvector![1.0, 2.0], &[0, 1]);
    assert_eq!(lp.minimize_eqpolytope(), Some(1));
    assert_eq!(lp.redundant_ids().len(), 1);

    let mut lp = LpClp::from_rows(&dmatrix![1.0, 1.0; 2.0, 2.0], &dvector![1.0, 3.0], &[0, 1]);
    assert_eq!(lp.minimize_eqpolytope(), None);
}

#[test]
fn degenerate_box_counts_as_equality() {
    let mut bbox = unit_square();
    bbox[0] = Interval::point(0.25);
    let mut lp = LpClp::new(2, Rc::new(CollectFacets::new(2)), &bbox);
    lp.add_constraint(dvector![1.0, 0.0], 0.25, true);
    assert_eq!(lp.minimize_eqpolytope(), Some(1));
}

#[test]
fn exhausted_budget_reports_solver_failure() {
    let cfg = LpCfg {
        timeout: Duration::ZERO,
        ..LpCfg::default()
    };
    let mut lp = lp_on_square(&[(dvector![1.0, 1.0], 1.5, false)]).with_cfg(cfg);
    let st = lp.solve(true);
    assert!(st.contains(LpStatus::ERROR_LPCOIN), "{st:?}");
    assert!(!st.contains(LpStatus::EMPTY));
}

#[test]
fn shared_collection_is_copied_on_write() {
    let facets = Rc::new(CollectFacets::new(2));
    let mut lp = LpClp::new(2, Rc::clone(&facets), &unit_square());
    lp.add_constraint(dvector![1.0, 0.0], 0.5, false);
    assert_eq!(facets.nb_facets(), 0);
    assert_eq!(lp.facets().nb_facets(), 1);
}

proptest! {
    #[test]
    fn prop_cut_square_bound_encloses_the_optimum(a in -1.0f64..1.0, b in -1.0f64..1.0, c in 0.1f64..1.5) {
        prop_assume!(a.abs() + b.abs() > 0.1);
        let bbox = IntervalVector::constant(2, Interval::new(-1.0, 1.0));
        let mut lp = LpClp::new(2, Rc::new(CollectFacets::new(2)), &bbox).with_objective(dvector![a, b]);
        lp.add_constraint(dvector![a, b], c, false);
        prop_assert!(!lp.solve(true).contains(LpStatus::EMPTY));
        let best = c.min(a.abs() + b.abs());
        let st = lp.solve(false);
        prop_assert!(!st.contains(LpStatus::EMPTY));
        if st.contains(LpStatus::BOUNDED) {
            prop_assert!(lp.valobj().ub() >= best - 1e-12);
        }
        if st.contains(LpStatus::NOTEMPTY) {
            prop_assert!(lp.valobj().lb() <= best + 1e-12);
        }
    }

    #[test]
    fn prop_unbounded_answers_come_with_a_point(a in -1.0f64..1.0, b in -1.0f64..1.0, c in -1.0f64..1.0) {
        let mut lp = LpClp::from_rows(&dmatrix![a, b; 0.0, -1.0], &dvector![c, 0.0], &[]).with_objective(dvector![1.0, 1.0]);
        let st = lp.solve(false);
        if st.contains(LpStatus::UNBOUNDED) {
            prop_assert!(st.contains(LpStatus::NOTEMPTY));
            prop_assert_eq!(lp.valobj().ub(), f64::INFINITY);
        }
    }

    #[test]
    fn prop_disjoint_half_lines_are_empty(p in -10.0f64..10.0, d in 0.01f64..1.0) {
        let mut lp = LpClp::from_rows(&dmatrix![1.0; -1.0], &dvector![p, -(p + d)], &[]);
        let st = lp.solve(true);
        prop_assert!(st.contains(LpStatus::EMPTY));
        prop_assert!(!st.intersects(LpStatus::NOTEMPTY | LpStatus::NOTEMPTY_APPROX));
    }
}
