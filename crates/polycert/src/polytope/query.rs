//! Accessors, bounds, containment and lazy resolution of the derived forms.

use std::rc::Rc;

use super::{Engine, PolState, Polytope, Repr, Update};
use crate::cfg::{GAP_EPS, IMPLIED_EPS};
use crate::dd::DdBuildF2V;
use crate::facet::{CollectFacets, Facet, FacetBase, InclRel};
use crate::faces;
use crate::interval::{sub_up, BoolInterval, Interval, IntervalVector};
use crate::lp::{LpClp, LpStatus};
use crate::Vector;

/// `x·c` for a box bound `x`; an infinite bound gives no information.
fn scaled_bound(x: f64, c: f64) -> Interval {
    if x.is_finite() {
        Interval::point(x) * c
    } else {
        Interval::ENTIRE
    }
}

impl Repr {
    /// Cheap enclosure of `max row·x`: box, the facets next to `base` in
    /// key order, the equalities, and the vertices when an enumeration is
    /// ready. Only the upper end is meaningful.
    pub(super) fn fast_bound(&self, base: &FacetBase) -> Interval {
        if base.is_null() {
            return Interval::ZERO;
        }
        if self.is(PolState::EMPTY) {
            return Interval::EMPTY;
        }
        let row = base.row();
        let g = base.gt_dim();
        let side = if row[g] > 0.0 { self.bbox[g].ub() } else { self.bbox[g].lb() };
        let mut res = scaled_bound(side, row[g]);
        let tighter = |res: &mut Interval, a: Interval| {
            if a.ub() < res.ub() {
                *res = a;
            }
        };
        if !base.is_coord() {
            let mut rest = row.clone();
            rest[g] = 0.0;
            res = res + self.bbox.dot_row(&rest);
            if let Some(f) = self.facets.find(base) {
                tighter(&mut res, Interval::point(f.rhs()));
            } else {
                let (before, after) = self.facets.neighbours(base);
                for f in before.into_iter().chain(after) {
                    tighter(&mut res, f.bound_linear_form(row, &self.bbox));
                }
            }
            for id in self.facets.eq_ids() {
                if let Some(f) = self.facets.get(id) {
                    tighter(&mut res, f.bound_linear_form(row, &self.bbox));
                }
            }
        }
        if let Some(dd) = self.f2v.as_deref().filter(|dd| dd.is_bounded()) {
            let top = dd
                .points()
                .iter()
                .fold(Interval::EMPTY, |acc, p| acc | p.dot_row(row));
            if !top.is_empty() {
                tighter(&mut res, top);
            }
        }
        res
    }

    /// Resolutions go through the LP model only when asked to and when no
    /// enumeration is at hand.
    fn use_lp(&self) -> bool {
        self.engine == Engine::Lp && !self.is(PolState::F2V_READY)
    }

    pub(super) fn build_f2v(&mut self) {
        if self.is(PolState::EMPTY) {
            return;
        }
        if self.is(PolState::F2V_READY) {
            self.state.insert(PolState::NOTEMPTY);
            return;
        }
        let mut dd = DdBuildF2V::new(self.dim, &self.bbox, &self.facets, true);
        let empty = dd.is_empty()
            || self
                .facets
                .iter()
                .filter(|f| !f.is_eq())
                .any(|f| dd.add_facet(f) == Update::Empty || dd.is_empty());
        if empty {
            tracing::debug!(dim = self.dim, facets = self.facets.nb_facets(), "enumeration found no vertex");
            self.set_empty();
            return;
        }
        tracing::debug!(dim = self.dim, vertices = dd.vertices().len(), lines = dd.lines().len(), "enumeration built");
        self.f2v = Some(Box::new(dd));
        self.state.insert(PolState::NOTEMPTY | PolState::F2V_READY);
    }

    fn lp_mut(&mut self) -> &mut LpClp {
        let (dim, cfg) = (self.dim, self.lp_cfg);
        let facets = Rc::clone(&self.facets);
        let bbox = &self.bbox;
        self.state.insert(PolState::CLP_READY);
        self.lp
            .get_or_insert_with(|| Box::new(LpClp::new(dim, facets, bbox).with_cfg(cfg)))
    }

    /// Exact maximum of `row·x` over the vertices, rays and lines.
    pub(super) fn f2v_bound(&mut self, row: &Vector) -> f64 {
        self.build_f2v();
        let Some(dd) = self.f2v.as_deref() else {
            return f64::NEG_INFINITY;
        };
        if dd.lines().iter().any(|l| dd.compute_vertex(l).dot_row(row) != Interval::ZERO) {
            return f64::INFINITY;
        }
        let mut best = f64::NEG_INFINITY;
        for v in dd.vertices() {
            let a = dd.compute_vertex(v.homogeneous()).dot_row(row);
            if v.is_ray() {
                if a.ub() > 0.0 {
                    return f64::INFINITY;
                }
            } else {
                best = best.max(a.ub());
            }
        }
        best
    }

    pub(super) fn bound_row(&mut self, row: &Vector) -> f64 {
        assert_eq!(row.len(), self.dim, "row dimension mismatch");
        if self.is(PolState::EMPTY) {
            return f64::NEG_INFINITY;
        }
        if self.use_lp() {
            let (st, val) = {
                let lp = self.lp_mut();
                lp.set_objective(row.clone());
                let st = lp.solve(false);
                (st, lp.valobj())
            };
            if st.contains(LpStatus::EMPTY) {
                self.set_empty();
                return f64::NEG_INFINITY;
            }
            if st.contains(LpStatus::NOTEMPTY) {
                self.state.insert(PolState::NOTEMPTY);
            }
            if st.contains(LpStatus::UNBOUNDED) {
                return f64::INFINITY;
            }
            if st.contains(LpStatus::BOUNDED) {
                if val.diam() <= GAP_EPS * (1.0 + val.lb().abs()) {
                    return val.ub();
                }
                tracing::debug!(%st, %val, "lp bound loose, enumerating");
                return val.ub().min(self.f2v_bound(row));
            }
            tracing::debug!(%st, "lp bound not certified, enumerating");
        }
        self.f2v_bound(row)
    }

    pub(super) fn check_empty(&mut self) -> bool {
        if self.is(PolState::NOTEMPTY) {
            return false;
        }
        if self.is(PolState::EMPTY) {
            return true;
        }
        if self.use_lp() {
            let st = self.lp_mut().solve(true);
            if st.contains(LpStatus::EMPTY) {
                self.set_empty();
                return true;
            }
            if st.contains(LpStatus::NOTEMPTY) {
                self.state.insert(PolState::NOTEMPTY);
                return false;
            }
            tracing::warn!(%st, "lp emptiness not certified, enumerating");
        }
        self.build_f2v();
        self.is(PolState::EMPTY)
    }

    pub(super) fn update_box(&mut self) {
        if self.is(PolState::BOXUPDATED) || self.is(PolState::EMPTY) {
            return;
        }
        let tight = if self.use_lp() {
            let lp = self.lp_mut();
            if lp.minimize_box() == Update::Empty {
                None
            } else {
                Some(lp.bbox().clone())
            }
        } else {
            self.build_f2v();
            self.f2v.as_deref().map(DdBuildF2V::build_bbox)
        };
        let Some(tight) = tight else {
            self.set_empty();
            return;
        };
        self.bbox &= &tight;
        if self.bbox.is_empty() {
            self.set_empty();
            return;
        }
        self.sync_lp_box();
        self.state.insert(PolState::BOXUPDATED);
    }

    pub(super) fn minimize(&mut self) {
        if self.is(PolState::MINIMIZED) || self.is(PolState::EMPTY) {
            return;
        }
        if self.use_lp() {
            self.minimize_lp();
        } else {
            self.minimize_f2v();
        }
    }

    fn remove_redundant(&mut self, redundant: &[usize]) {
        if redundant.is_empty() {
            return;
        }
        let facets = self.facets_mut();
        for &id in redundant {
            facets.remove_by_id(id);
        }
        let map = facets.renumber();
        if let Some(dd) = self.f2v.as_deref_mut() {
            dd.update_renumber(&map);
        }
    }

    fn minimize_f2v(&mut self) {
        self.build_f2v();
        let Some(dd) = self.f2v.as_deref_mut() else { return };
        let redundant = dd.redundant_facets();
        let tight = dd.build_bbox();
        self.bbox &= &tight;
        if self.bbox.is_empty() {
            self.set_empty();
            return;
        }
        self.remove_redundant(&redundant);
        self.sync_lp_box();
        self.state.insert(PolState::MINIMIZED | PolState::BOXUPDATED);
    }

    fn minimize_lp(&mut self) {
        let checkbox = !self.is(PolState::BOXUPDATED);
        let (kept, tight, redundant) = {
            let lp = self.lp_mut();
            let kept = lp.minimize_polytope(Interval::new(0.0, IMPLIED_EPS), false, checkbox);
            (kept, lp.bbox().clone(), lp.redundant_ids())
        };
        if kept.is_none() {
            self.set_empty();
            return;
        }
        if checkbox {
            self.bbox &= &tight;
            self.state.insert(PolState::BOXUPDATED);
        }
        tracing::debug!(removed = redundant.len(), "lp minimization applied");
        self.remove_redundant(&redundant);
        self.state.insert(PolState::MINIMIZED);
    }

    pub(super) fn contains(&self, b: &IntervalVector) -> BoolInterval {
        assert_eq!(b.size(), self.dim, "box dimension mismatch");
        if b.is_empty() {
            return BoolInterval::True;
        }
        if self.is(PolState::EMPTY) || !b.is_subset(&self.bbox) {
            return BoolInterval::False;
        }
        let mut res = BoolInterval::True;
        for f in self.facets.iter() {
            let rel = f.relation_box(b, false);
            if rel.contains(InclRel::NOTINCLUDE) {
                return BoolInterval::False;
            }
            if rel.contains(InclRel::MAYINCLUDE) {
                res = BoolInterval::Unknown;
            }
        }
        res
    }

    pub(super) fn intersects(&self, b: &IntervalVector) -> BoolInterval {
        assert_eq!(b.size(), self.dim, "box dimension mismatch");
        if b.is_empty() || self.is(PolState::EMPTY) || b.is_disjoint(&self.bbox) {
            return BoolInterval::False;
        }
        // constraints that only certainly meet the box; one of them may
        // still be combined with constraints including the whole box
        let mut partial = usize::from(!b.is_subset(&self.bbox));
        let mut certain = true;
        for f in self.facets.iter() {
            let rel = f.relation_box(b, false);
            if rel.contains(InclRel::DISJOINT) {
                return BoolInterval::False;
            }
            if rel.contains(InclRel::INCLUDES) {
                continue;
            }
            if rel.contains(InclRel::INTERSECTS) {
                partial += 1;
            } else {
                certain = false;
            }
        }
        if certain && partial <= 1 {
            BoolInterval::True
        } else {
            BoolInterval::Unknown
        }
    }
}

impl Polytope {
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of constraints, counting the `2·dim` bounds of the box;
    /// `None` for the empty set.
    pub fn nb_facets(&self) -> Option<usize> {
        let r = self.repr.borrow();
        (!r.is(PolState::EMPTY)).then(|| 2 * self.dim + r.facets.nb_facets())
    }

    /// Number of equalities, counting the degenerate box components.
    pub fn nb_eq_facets(&self) -> Option<usize> {
        let r = self.repr.borrow();
        (!r.is(PolState::EMPTY)).then(|| r.bbox.nb_degenerated() + r.facets.nb_eq_facets())
    }

    /// With `check`, emptiness is resolved (enumeration or LP); otherwise
    /// the last known answer is returned.
    pub fn is_empty(&self, check: bool) -> bool {
        if !check {
            return self.repr.borrow().is(PolState::EMPTY);
        }
        self.repr.borrow_mut().check_empty()
    }

    /// Empty, or contained in a hyperplane given by the box or an equality.
    pub fn is_flat(&self) -> bool {
        let r = self.repr.borrow();
        r.is(PolState::EMPTY) || r.bbox.nb_degenerated() > 0 || r.facets.nb_eq_facets() > 0
    }

    /// Current box is bisectable (the box is not tightened first).
    pub fn is_bisectable(&self) -> bool {
        self.repr.borrow().bbox.is_bisectable()
    }

    /// Component `i` of the tight bounding box.
    pub fn component(&self, i: usize) -> Interval {
        assert!(i < self.dim, "component {i} out of range");
        let mut r = self.repr.borrow_mut();
        r.update_box();
        r.bbox[i]
    }

    /// Bounding box, tightened first when `tight`.
    pub fn bbox(&self, tight: bool) -> IntervalVector {
        let mut r = self.repr.borrow_mut();
        if tight {
            r.update_box();
        }
        r.bbox.clone()
    }

    /// Tight bounding box included in `x`.
    pub fn box_is_subset(&self, x: &IntervalVector) -> bool {
        self.bbox(true).is_subset(x)
    }

    /// A point inside when one can be exhibited (LP feasible point or
    /// centroid of the vertices), else the middle of the box. NaN for the
    /// empty set.
    pub fn mid(&self) -> Vector {
        let mut r = self.repr.borrow_mut();
        if r.check_empty() {
            return Vector::from_element(self.dim, f64::NAN);
        }
        if r.use_lp() {
            let lp = r.lp_mut();
            if lp.solve(true).contains(LpStatus::NOTEMPTY) {
                return lp.feasible_point().mid();
            }
        }
        r.build_f2v();
        let points = match r.f2v.as_deref() {
            Some(dd) if dd.is_bounded() => dd.points(),
            _ => Vec::new(),
        };
        if points.is_empty() {
            return r.bbox.mid();
        }
        let sum = points.iter().fold(Vector::zeros(self.dim), |acc, p| acc + p.mid());
        sum / points.len() as f64
    }

    /// Shared facet collection (box bounds excluded).
    pub fn facets(&self) -> Rc<CollectFacets> {
        Rc::clone(&self.repr.borrow().facets)
    }

    /// Cheap enclosure of `max base.row·x`; only the upper end is
    /// meaningful.
    pub fn fast_bound(&self, base: &FacetBase) -> Interval {
        self.repr.borrow().fast_bound(base)
    }

    /// Maximum of `row·x`: `−∞` when empty, `+∞` when unbounded.
    pub fn bound_row(&self, row: &Vector) -> f64 {
        self.repr.borrow_mut().bound_row(row)
    }

    /// Upper bound of `fc.row·x − fc.rhs` over the polytope.
    pub fn distance_cst(&self, fc: &Facet) -> f64 {
        let b = self.bound_row(fc.as_ref().row());
        if !b.is_finite() {
            return b;
        }
        sub_up(b, fc.as_ref().rhs())
    }

    /// Whether the box lies inside: `True` only when every constraint
    /// provably includes it.
    pub fn contains(&self, b: &IntervalVector) -> BoolInterval {
        self.repr.borrow().contains(b)
    }

    pub fn intersects(&self, b: &IntervalVector) -> BoolInterval {
        self.repr.borrow().intersects(b)
    }

    /// Whether the two polytopes meet, decided on their intersection.
    pub fn intersects_polytope(&self, other: &Polytope) -> BoolInterval {
        assert_eq!(self.dim, other.dim, "dimension mismatch");
        if self.is_empty(false) || other.is_empty(false) {
            return BoolInterval::False;
        }
        if self.bbox(false).is_disjoint(&other.bbox(false)) {
            return BoolInterval::False;
        }
        let mut meet = self.clone();
        meet.meet_with_polytope(other);
        (!meet.is_empty(true)).into()
    }

    /// Whether `self ⊆ other` is proved: boxes first, then every constraint
    /// of `other` (both sides of equalities) against `fast_bound`, and with
    /// `check_f2v` against the exact bound from the enumeration.
    pub fn is_subset(&self, other: &Polytope, check_f2v: bool) -> bool {
        assert_eq!(self.dim, other.dim, "dimension mismatch");
        if self.is_empty(true) {
            return true;
        }
        if other.is_empty(true) {
            return false;
        }
        let b2 = other.bbox(true);
        if !self.bbox(true).is_subset(&b2) {
            return false;
        }
        let theirs = other.facets();
        for f in theirs.iter() {
            let mut sides = vec![(FacetBase::new(f.row().clone()), f.rhs())];
            if f.is_eq() {
                sides.push((FacetBase::new(-f.row()), -f.rhs()));
            }
            for (base, rhs) in sides {
                if self.fast_bound(&base).ub() <= rhs {
                    continue;
                }
                if check_f2v && self.repr.borrow_mut().f2v_bound(base.row()) <= rhs {
                    continue;
                }
                return false;
            }
        }
        true
    }

    /// Remove the facets implied by the others (and tighten the box).
    pub fn minimize_constraints(&self) {
        self.repr.borrow_mut().minimize();
    }

    /// Tighten the bounding box.
    pub fn update_box(&self) {
        self.repr.borrow_mut().update_box();
    }

    /// Finite vertices of the polytope (rays and lines are not listed).
    pub fn vertices(&self) -> Vec<IntervalVector> {
        let mut r = self.repr.borrow_mut();
        r.build_f2v();
        r.f2v.as_deref().map(DdBuildF2V::points).unwrap_or_default()
    }

    /// Faces of a 3-dimensional polytope as cycles of points.
    pub fn vertices_3d_facets(&self) -> Vec<Vec<Vector>> {
        let mut r = self.repr.borrow_mut();
        r.build_f2v();
        r.f2v
            .as_deref()
            .map(|dd| faces::build_3d_facets(dd, 50.0))
            .unwrap_or_default()
    }

    /// Boundary of a 2-dimensional polytope as a cycle of points.
    pub fn vertices_2d_facet(&self) -> Vec<Vector> {
        let mut r = self.repr.borrow_mut();
        r.build_f2v();
        r.f2v
            .as_deref()
            .map(|dd| faces::build_2d_facet(dd, 50.0))
            .unwrap_or_default()
    }
}
