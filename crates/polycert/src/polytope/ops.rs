//! Constraint addition, meets and unions.

use std::ops::{BitAndAssign, BitOrAssign};
use std::rc::Rc;

use super::{PolState, Polytope, Repr, Update};
use crate::facet::{CollectFacets, DuplicateAction, FacetBase, Insertion};
use crate::interval::{Interval, IntervalVector};
use crate::Vector;

impl Repr {
    /// Add `row·x ≤ rhs`. Nothing is added when `fast_bound` already proves
    /// it up to `tol`. Returns whether the polytope changed.
    pub(super) fn add_constraint(&mut self, row: Vector, rhs: f64, tol: f64) -> bool {
        assert_eq!(row.len(), self.dim, "row dimension mismatch");
        if self.is(PolState::EMPTY) {
            return false;
        }
        let base = FacetBase::new(row);
        if base.is_null() {
            if rhs >= -tol {
                return false;
            }
            self.set_empty();
            return true;
        }
        if self.fast_bound(&base).ub() <= rhs + tol {
            return false;
        }
        let opposite = FacetBase::new(-base.row());
        if -self.fast_bound(&opposite).ub() > rhs {
            tracing::debug!(rhs, "constraint excludes the whole polytope");
            self.set_empty();
            return true;
        }
        if base.is_coord() {
            return self.add_coord_bound(&base, rhs);
        }
        let id = match self.facets_mut().insert(base.row().clone(), rhs, false, DuplicateAction::MinRhs) {
            Insertion::Empty => {
                self.set_empty();
                return true;
            }
            Insertion::Unchanged => return false,
            Insertion::New(id) | Insertion::Updated(id) => id,
        };
        let mut update = Update::Changed;
        if let (Some(dd), Some(f)) = (self.f2v.as_deref_mut(), self.facets.get(id)) {
            update = dd.add_facet(f);
        }
        if update == Update::Empty {
            self.set_empty();
            return true;
        }
        self.constraints_changed();
        true
    }

    /// `c·x_g ≤ rhs` goes into the box.
    fn add_coord_bound(&mut self, base: &FacetBase, rhs: f64) -> bool {
        let g = base.gt_dim();
        let c = base.row()[g];
        let val = Interval::point(rhs) / c;
        let bound = if c > 0.0 {
            Interval::new(f64::NEG_INFINITY, val.ub())
        } else {
            Interval::new(val.lb(), f64::INFINITY)
        };
        self.bbox[g] &= bound;
        if self.bbox[g].is_empty() {
            self.set_empty();
            return true;
        }
        self.sync_lp_box();
        if let Some(dd) = self.f2v.as_deref_mut() {
            let update = if c > 0.0 {
                dd.add_bound_var(g, true, val.ub())
            } else {
                dd.add_bound_var(g, false, -val.lb())
            };
            match update {
                Update::Empty => {
                    self.set_empty();
                    return true;
                }
                Update::Unchanged => return false,
                Update::Changed => {}
            }
        }
        self.constraints_changed();
        true
    }

    /// Add `row·x ≤ rhs` for an interval row: the middle row is kept and the
    /// remainder is bounded over the box.
    pub(super) fn add_constraint_interval(&mut self, row: &IntervalVector, rhs: f64, tol: f64) -> bool {
        let mid = row.mid();
        let rem = row - &IntervalVector::from_point(&mid);
        let d = (rem.dot(&self.bbox) + rhs).ub();
        if !d.is_finite() {
            return false;
        }
        self.add_constraint(mid, d, tol)
    }

    /// `row·x ∈ rhs`: both sides, each skipped when infinite.
    pub(super) fn add_constraint_band(&mut self, row: &IntervalVector, rhs: Interval, tol: f64) -> (bool, bool) {
        let upper = rhs.ub() < f64::INFINITY && self.add_constraint_interval(row, rhs.ub(), tol);
        let lower = rhs.lb() > f64::NEG_INFINITY && self.add_constraint_interval(&-row, -rhs.lb(), tol);
        (lower, upper)
    }

    pub(super) fn add_equality(&mut self, row: Vector, rhs: f64) -> Update {
        assert_eq!(row.len(), self.dim, "row dimension mismatch");
        if self.is(PolState::EMPTY) {
            return Update::Empty;
        }
        let base = FacetBase::new(row);
        if base.is_null() {
            if rhs == 0.0 {
                return Update::Unchanged;
            }
            self.set_empty();
            return Update::Empty;
        }
        if base.is_coord() {
            let g = base.gt_dim();
            let val = Interval::point(rhs) / base.row()[g];
            let old = self.bbox[g];
            self.bbox[g] &= val;
            if self.bbox[g].is_empty() {
                self.set_empty();
                return Update::Empty;
            }
            if self.bbox[g] == old {
                return Update::Unchanged;
            }
            self.sync_lp_box();
            self.drop_f2v();
            self.constraints_changed();
            return Update::Changed;
        }
        let opposite = FacetBase::new(-base.row());
        if self.fast_bound(&base).ub() < rhs || self.fast_bound(&opposite).ub() < -rhs {
            self.set_empty();
            return Update::Empty;
        }
        match self.facets_mut().insert(base.row().clone(), rhs, true, DuplicateAction::MinRhs) {
            Insertion::Empty => {
                self.set_empty();
                return Update::Empty;
            }
            Insertion::Unchanged => return Update::Unchanged,
            _ => {}
        }
        self.drop_f2v();
        self.constraints_changed();
        Update::Changed
    }

    pub(super) fn meet_with_box(&mut self, b: &IntervalVector) -> Update {
        assert_eq!(b.size(), self.dim, "box dimension mismatch");
        if self.is(PolState::EMPTY) {
            return Update::Empty;
        }
        if b.is_empty() || self.bbox.is_disjoint(b) {
            self.set_empty();
            return Update::Empty;
        }
        if self.bbox.is_subset(b) {
            return Update::Unchanged;
        }
        let met = &self.bbox & b;
        let flattened = (0..self.dim).any(|i| met[i].is_degenerated() && !self.bbox[i].is_degenerated());
        self.bbox = met;
        self.sync_lp_box();
        if flattened {
            self.drop_f2v();
        } else if let Some(dd) = self.f2v.as_deref_mut() {
            if dd.add_constraint_box(b) == Update::Empty {
                self.set_empty();
                return Update::Empty;
            }
        }
        self.constraints_changed();
        Update::Changed
    }

    /// Conjunction with another constraint system given by its box and
    /// facets.
    pub(super) fn meet_with_facets(&mut self, bbox: &IntervalVector, facets: &Rc<CollectFacets>) -> Update {
        if facets.is_empty() {
            return self.meet_with_box(bbox);
        }
        if self.is(PolState::EMPTY) {
            return Update::Empty;
        }
        self.bbox &= bbox;
        if self.bbox.is_empty() {
            self.set_empty();
            return Update::Empty;
        }
        if !Rc::ptr_eq(&self.facets, facets)
            && self.facets_mut().merge(facets, DuplicateAction::MinRhs).is_none()
        {
            self.set_empty();
            return Update::Empty;
        }
        self.sync_lp_box();
        self.drop_f2v();
        self.constraints_changed();
        Update::Changed
    }
}

impl Polytope {
    /// Add `row·x ≤ rhs`; returns whether the polytope changed.
    pub fn add_constraint(&mut self, row: Vector, rhs: f64, tolerance: f64) -> bool {
        self.repr.get_mut().add_constraint(row, rhs, tolerance)
    }

    pub fn add_constraint_interval(&mut self, row: &IntervalVector, rhs: f64, tolerance: f64) -> bool {
        assert_eq!(row.size(), self.dim, "row dimension mismatch");
        self.repr.get_mut().add_constraint_interval(row, rhs, tolerance)
    }

    /// Add `row·x ∈ rhs`; returns whether the lower and the upper side
    /// changed the polytope.
    pub fn add_constraint_band(&mut self, row: &IntervalVector, rhs: Interval, tolerance: f64) -> (bool, bool) {
        assert_eq!(row.size(), self.dim, "row dimension mismatch");
        self.repr.get_mut().add_constraint_band(row, rhs, tolerance)
    }

    /// Add `row·x = rhs`.
    pub fn add_equality(&mut self, row: Vector, rhs: f64) -> Update {
        self.repr.get_mut().add_equality(row, rhs)
    }

    pub fn meet_with_box(&mut self, b: &IntervalVector) -> Update {
        self.repr.get_mut().meet_with_box(b)
    }

    pub fn meet_with_polytope(&mut self, other: &Polytope) -> Update {
        assert_eq!(self.dim, other.dim, "dimension mismatch");
        let (empty, bbox, facets) = {
            let o = other.repr.borrow();
            (o.is(PolState::EMPTY), o.bbox.clone(), Rc::clone(&o.facets))
        };
        let r = self.repr.get_mut();
        if empty {
            r.set_empty();
            return Update::Empty;
        }
        r.meet_with_facets(&bbox, &facets)
    }

    /// Replace by the convex hull of the union. Unchanged when `other` is
    /// already proved to be inside.
    pub fn join_with_polytope(&mut self, other: &Polytope) -> Update {
        assert_eq!(self.dim, other.dim, "dimension mismatch");
        if other.is_empty(true) || other.is_subset(self, false) {
            return Update::Unchanged;
        }
        if self.is_empty(true) {
            let joined = self.inherit(other.clone());
            *self = joined;
            return Update::Changed;
        }
        if let Some(u) = Polytope::union_of_polytopes(&[self.clone(), other.clone()]) {
            *self = u;
        }
        Update::Changed
    }

    /// Convex outer approximation of the union: hull of the vertices of the
    /// operands, cut by the hull of their boxes. An unbounded operand gives
    /// the hull of the boxes. `None` for an empty list.
    pub fn union_of_polytopes(list: &[Polytope]) -> Option<Polytope> {
        let first = list.first()?;
        let dim = first.dim;
        let live: Vec<&Polytope> = list.iter().filter(|p| !p.is_empty(true)).collect();
        match live.as_slice() {
            [] => return Some(first.inherit(Polytope::empty(dim))),
            [p] => return Some((*p).clone()),
            _ => {}
        }
        let hull = live
            .iter()
            .fold(IntervalVector::empty(dim), |acc, p| &acc | &p.bbox(true));
        if hull.is_unbounded() {
            return Some(first.inherit(Polytope::from_box(&hull)));
        }
        let vertices: Vec<IntervalVector> = live.iter().flat_map(|p| p.vertices()).collect();
        if vertices.is_empty() {
            return Some(first.inherit(Polytope::empty(dim)));
        }
        let mut res = Polytope::from_interval_vertices(&vertices);
        res.meet_with_box(&hull);
        tracing::debug!(operands = live.len(), vertices = vertices.len(), "union hulled");
        Some(first.inherit(res))
    }

    pub fn set_empty(&mut self) {
        self.repr.get_mut().set_empty();
    }

    /// Reset to the single point `0`.
    pub fn clear(&mut self) {
        let r = self.repr.get_mut();
        r.bbox = IntervalVector::zeros(self.dim);
        r.facets = Rc::new(CollectFacets::new(self.dim));
        r.drop_f2v();
        r.drop_lp();
        r.state = PolState::INIT;
    }
}

impl BitAndAssign<&IntervalVector> for Polytope {
    fn bitand_assign(&mut self, rhs: &IntervalVector) {
        self.meet_with_box(rhs);
    }
}

impl BitAndAssign<&Polytope> for Polytope {
    fn bitand_assign(&mut self, rhs: &Polytope) {
        self.meet_with_polytope(rhs);
    }
}

impl BitOrAssign<&Polytope> for Polytope {
    fn bitor_assign(&mut self, rhs: &Polytope) {
        self.join_with_polytope(rhs);
    }
}
