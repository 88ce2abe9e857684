use super::*;
use crate::interval::{Interval, IntervalVector};
use crate::Vector;
use proptest::prelude::*;

fn v(xs: &[f64]) -> Vector {
    Vector::from_vec(xs.to_vec())
}

#[test]
fn key_of_coordinate_rows() {
    let b = FacetBase::new(v(&[0.0, 2.0, 0.0]));
    assert!(b.is_coord());
    assert_eq!(b.gt_dim(), 1);
    assert_eq!(b.key(), (6, 0.0));
    let nb = FacetBase::new(v(&[0.0, -2.0, 0.0]));
    assert!(nb.is_coord());
    assert_eq!(nb.gt_dim(), 1);
    assert_eq!(nb.key(), (24, 0.0));
}

#[test]
fn key_of_general_rows() {
    let b = FacetBase::new(v(&[1.0, -3.0]));
    assert!(!b.is_coord());
    assert_eq!(b.gt_dim(), 1);
    assert!((b.key().1 - 1.0 / 3.0).abs() < 1e-15);
    assert!(FacetBase::new(v(&[0.0, 0.0])).is_null());
    // ties go to the first index
    assert_eq!(FacetBase::new(v(&[1.0, 1.0])).gt_dim(), 0);
}

#[test]
fn negation_matches_recomputed_key() {
    for row in [[1.0, -3.0, 0.5], [0.0, 0.0, -2.0], [4.0, 4.0, 1.0]] {
        let mut b = FacetBase::new(v(&row));
        b.negate_row();
        let fresh = FacetBase::new(-v(&row));
        assert_eq!(b.key(), fresh.key());
        assert_eq!(b, fresh);
    }
}

#[test]
fn negative_zero_does_not_split_keys() {
    assert_eq!(FacetBase::new(v(&[1.0, -0.0])), FacetBase::new(v(&[1.0, 0.0])));
}

#[test]
fn insert_assigns_ids_and_tracks_equalities() {
    let mut cf = CollectFacets::new(2);
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 1.0, false, DuplicateAction::KeepRhs), Insertion::New(1));
    assert_eq!(cf.insert(v(&[1.0, -1.0]), 0.0, true, DuplicateAction::KeepRhs), Insertion::New(2));
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 3.0, false, DuplicateAction::KeepRhs), Insertion::Unchanged);
    assert_eq!(cf.nb_facets(), 2);
    assert_eq!(cf.nb_eq_facets(), 1);
    assert_eq!(cf.eq_facet(0).id(), 2);
    assert_eq!(cf.get(1).unwrap().rhs(), 1.0);
}

#[test]
fn min_rhs_tightens_and_detects_emptiness() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 1.0]), 1.0, false, DuplicateAction::KeepRhs);
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 2.0, false, DuplicateAction::MinRhs), Insertion::Unchanged);
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 0.5, false, DuplicateAction::MinRhs), Insertion::Updated(1));
    assert_eq!(cf.get(1).unwrap().rhs(), 0.5);
    // x + y = 0.7 is outside x + y <= 0.5
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 0.7, true, DuplicateAction::MinRhs), Insertion::Empty);
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 0.2, true, DuplicateAction::MinRhs), Insertion::Updated(1));
    assert!(cf.get(1).unwrap().is_eq());
    assert_eq!(cf.insert(v(&[1.0, 1.0]), 0.1, false, DuplicateAction::MinRhs), Insertion::Empty);
}

#[test]
fn max_rhs_splits_two_equalities() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 2.0]), 1.0, true, DuplicateAction::KeepRhs);
    let ins = cf.insert(v(&[1.0, 2.0]), 3.0, true, DuplicateAction::MaxRhs);
    assert_eq!(ins, Insertion::New(2));
    assert_eq!(cf.nb_eq_facets(), 0);
    let up = cf.get(1).unwrap();
    assert_eq!(up.rhs(), 3.0);
    let down = cf.get(2).unwrap();
    assert_eq!(down.row(), &v(&[-1.0, -2.0]));
    assert_eq!(down.rhs(), -1.0);
}

#[test]
fn dissociate_keeps_both_sides() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 1.0]), 1.0, true, DuplicateAction::KeepRhs);
    let id = cf.dissociate_eq_facet(0, 0.5, DuplicateAction::MaxRhs).unwrap();
    assert_eq!(cf.nb_eq_facets(), 0);
    assert_eq!(cf.get(1).unwrap().rhs(), 1.0);
    let neg = cf.get(id).unwrap();
    assert_eq!(neg.row(), &v(&[-1.0, -1.0]));
    assert_eq!(neg.rhs(), -0.5);

    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 1.0]), 1.0, true, DuplicateAction::KeepRhs);
    assert_eq!(cf.dissociate_eq_facet(0, f64::INFINITY, DuplicateAction::MaxRhs), Some(1));
    let f = cf.get(1).unwrap();
    assert_eq!(f.row(), &v(&[-1.0, -1.0]));
    assert_eq!(f.rhs(), -1.0);
    assert!(!f.is_eq());
}

#[test]
fn change_row_merges_duplicates() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 0.5]), 1.0, false, DuplicateAction::KeepRhs);
    cf.insert(v(&[1.0, 1.0]), 2.0, false, DuplicateAction::KeepRhs);
    assert_eq!(
        cf.change_ineq_facet(1, v(&[1.0, 1.0]), 1.5, DuplicateAction::MinRhs),
        Rekey::Merged { id: 1, absorbed: 2 }
    );
    assert_eq!(cf.nb_facets(), 1);
    assert!(cf.get(2).is_none());
    assert_eq!(cf.get(1).unwrap().rhs(), 1.5);
    assert_eq!(cf.change_ineq_facet(1, v(&[2.0, 1.0]), 0.0, DuplicateAction::KeepRhs), Rekey::Moved(1));
    cf.insert(v(&[1.0, 1.0]), 0.0, false, DuplicateAction::KeepRhs);
    assert_eq!(cf.change_ineq_facet(1, v(&[1.0, 1.0]), 3.0, DuplicateAction::MinRhs), Rekey::Dropped);
    assert_eq!(cf.nb_facets(), 1);
}

#[test]
fn extract_box_and_renumber() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[2.0, 0.0]), 2.0, false, DuplicateAction::KeepRhs); // x <= 1
    cf.insert(v(&[1.0, 1.0]), 1.5, false, DuplicateAction::KeepRhs);
    cf.insert(v(&[-1.0, 0.0]), 0.0, false, DuplicateAction::KeepRhs); // x >= 0
    cf.insert(v(&[0.0, 1.0]), 0.5, true, DuplicateAction::KeepRhs); // y = 0.5
    cf.insert(v(&[0.0, 0.0]), 1.0, false, DuplicateAction::KeepRhs);
    let b = cf.extract_box();
    assert_eq!(b[0], Interval::new(0.0, 1.0));
    assert_eq!(b[1], Interval::point(0.5));
    assert_eq!(cf.nb_facets(), 1);
    assert_eq!(cf.nb_eq_facets(), 0);
    let map = cf.renumber();
    assert_eq!(map, vec![None, Some(1), None, None, None]);
    assert_eq!(cf.get(1).unwrap().rhs(), 1.5);
    assert!(cf.renumber().is_empty());
}

#[test]
fn infeasible_null_row_gives_empty_box() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[0.0, 0.0]), -1.0, false, DuplicateAction::KeepRhs);
    assert!(cf.extract_box().is_empty());
}

#[test]
fn encompass_vertices_splits_equalities() {
    let mut cf = CollectFacets::new(2);
    cf.insert(v(&[1.0, 1.0]), 0.0, true, DuplicateAction::KeepRhs);
    cf.insert(v(&[1.0, 0.0]), 0.0, false, DuplicateAction::KeepRhs);
    let pts = [v(&[0.0, 0.0]), v(&[1.0, 0.0]), v(&[0.0, 2.0])];
    let verts: Vec<IntervalVector> = pts.iter().map(IntervalVector::from_point).collect();
    let mut bbox = IntervalVector::entire(2);
    cf.encompass_vertices(&verts, &mut bbox, true);
    assert_eq!(bbox[0], Interval::new(0.0, 1.0));
    assert_eq!(bbox[1], Interval::new(0.0, 2.0));
    assert_eq!(cf.nb_eq_facets(), 0);
    assert_eq!(cf.nb_facets(), 3);
    let top = cf.find(&FacetBase::new(v(&[1.0, 1.0]))).unwrap();
    assert_eq!(top.rhs(), 2.0);
    let bottom = cf.find(&FacetBase::new(v(&[-1.0, -1.0]))).unwrap();
    assert_eq!(bottom.rhs(), 0.0);
}

#[test]
fn merge_reports_infeasible_duplicates() {
    let mut a = CollectFacets::new(1);
    a.insert(v(&[1.0]), 1.0, true, DuplicateAction::KeepRhs);
    let mut b = CollectFacets::new(1);
    b.insert(v(&[1.0]), 2.0, true, DuplicateAction::KeepRhs);
    assert_eq!(a.clone().merge(&b, DuplicateAction::MinRhs), None);
    let mut c = CollectFacets::new(1);
    c.insert(v(&[-1.0]), 0.0, false, DuplicateAction::KeepRhs);
    assert_eq!(a.merge(&c, DuplicateAction::MinRhs), Some(1));
}

#[test]
fn relation_with_boxes() {
    let f = Facet::new(v(&[1.0, 1.0]), 1.0, false);
    let inside = IntervalVector::from_bounds(&[0.0, 0.0], &[0.5, 0.5]);
    let across = IntervalVector::from_bounds(&[0.0, 0.0], &[1.0, 1.0]);
    let outside = IntervalVector::from_bounds(&[1.0, 1.0], &[2.0, 2.0]);
    assert!(f.as_ref().relation_box(&inside, false).contains(InclRel::INCLUDES));
    let r = f.as_ref().relation_box(&across, false);
    assert!(r.contains(InclRel::NOTINCLUDE | InclRel::INTERSECTS));
    assert!(f.as_ref().relation_box(&outside, false).contains(InclRel::DISJOINT));
    // touching the boundary only
    let corner = IntervalVector::from_bounds(&[0.5, 0.5], &[1.0, 1.0]);
    assert!(f.as_ref().relation_box(&corner, false).contains(InclRel::INTERSECTS));
    assert!(f.as_ref().relation_box(&corner, true).contains(InclRel::DISJOINT));
}

#[test]
fn contraction_inside_and_outside() {
    let f = Facet::new(v(&[1.0, 1.0]), 1.0, false);
    let mut b = IntervalVector::from_bounds(&[0.0, 0.0], &[2.0, 2.0]);
    f.as_ref().contract_box(&mut b);
    assert_eq!(b[0], Interval::new(0.0, 1.0));
    assert_eq!(b[1], Interval::new(0.0, 1.0));

    let mut out = IntervalVector::from_bounds(&[0.0, 0.0], &[2.0, 0.5]);
    f.as_ref().contract_out_box(&mut out);
    assert_eq!(out[0], Interval::new(0.5, 2.0));

    let c = Facet::new(v(&[2.0, 0.0]), 1.0, false);
    let mut cb = IntervalVector::from_bounds(&[0.0, 0.0], &[1.0, 1.0]);
    c.as_ref().contract_out_box(&mut cb);
    assert_eq!(cb[0], Interval::new(0.5, 1.0));
    let mut gone = IntervalVector::from_bounds(&[0.0, 0.0], &[0.5, 1.0]);
    c.as_ref().contract_out_box(&mut gone);
    assert!(gone.is_empty());
}

#[test]
fn bound_linear_form_uses_dominant_coordinate() {
    // x + 0.5 y <= 1 over y in [0, 2] bounds 2x + y by 2
    let f = Facet::new(v(&[1.0, 0.5]), 1.0, false);
    let b = IntervalVector::from_bounds(&[-10.0, 0.0], &[10.0, 2.0]);
    let r = f.as_ref().bound_linear_form(&v(&[2.0, 1.0]), &b);
    assert!(r.ub() >= 2.0 && r.ub() < 2.0 + 1e-12);
    // opposite direction is not bounded by an inequality
    assert_eq!(f.as_ref().bound_linear_form(&v(&[-1.0, 0.0]), &b), Interval::ENTIRE);
}

proptest! {
    #[test]
    fn prop_positive_scaling_keeps_key(a in -5.0f64..5.0, b in -5.0f64..5.0, c in -5.0f64..5.0, s in 1u32..8) {
        let row = v(&[a, b, c]);
        let k1 = FacetBase::new(row.clone()).key();
        let k2 = FacetBase::new(row * f64::from(1u32 << s)).key();
        prop_assert_eq!(k1, k2);
    }

    #[test]
    fn prop_extracted_box_is_intersection(lo in -5.0f64..0.0, hi in 0.0f64..5.0, lo2 in -5.0f64..0.0) {
        let mut cf = CollectFacets::new(1);
        cf.insert(v(&[1.0]), hi, false, DuplicateAction::KeepRhs);
        cf.insert(v(&[-1.0]), -lo, false, DuplicateAction::KeepRhs);
        cf.insert(v(&[-2.0]), -2.0 * lo2, false, DuplicateAction::KeepRhs);
        let b = cf.extract_box();
        prop_assert!(b[0].contains(lo.max(lo2)));
        prop_assert!(b[0].contains(hi));
        prop_assert!(b[0].lb() >= lo.max(lo2) - 1e-12);
        prop_assert_eq!(cf.nb_facets(), 0);
    }
}
