//! Inflations, homothety, affine maps and sums.
//!
//! In-place transforms rewrite the bound of every facet with an interval;
//! an equality whose new bound is no longer a single value becomes a band
//! of two inequalities. Transforms that change the facet directions build a
//! new polytope.

use std::ops::Add;

use super::{PolState, Polytope, Repr};
use crate::facet::{CollectFacets, DuplicateAction, Insertion};
use crate::interval::{Interval, IntervalMatrix, IntervalVector, Upward};
use crate::Vector;

impl Repr {
    /// Replace each bound `rhs` of `row·x ≤ rhs` (or `= rhs`) by the
    /// interval `new_rhs(row, rhs)`.
    fn transform_rhs(&mut self, new_rhs: impl Fn(&Vector, f64) -> Interval) {
        let facets = self.facets_mut();
        let ineqs: Vec<(usize, Interval)> = facets
            .iter()
            .filter(|f| !f.is_eq())
            .map(|f| (f.id(), new_rhs(f.row(), f.rhs())))
            .collect();
        for (id, v) in ineqs {
            facets.change_rhs(id, v.ub());
        }
        // dissociation swap-removes from the equality list
        for k in (0..facets.nb_eq_facets()).rev() {
            let f = facets.eq_facet(k);
            let (id, v) = (f.id(), new_rhs(f.row(), f.rhs()));
            facets.change_rhs(id, v.ub());
            if !v.is_degenerated() {
                facets.dissociate_eq_facet(k, v.lb(), DuplicateAction::MinRhs);
            }
        }
        self.drop_f2v();
        self.state.remove(PolState::MINIMIZED | PolState::BOXUPDATED);
    }

    fn homothety(&mut self, c: &IntervalVector, delta: f64) {
        let keep = Interval::ONE - delta;
        self.bbox = &(c * keep) + &(&self.bbox * Interval::point(delta));
        self.sync_lp_box();
        self.transform_rhs(|row, rhs| Interval::point(rhs) * delta + keep * c.dot_row(row));
    }

    fn inflate_box(&mut self, b: &IntervalVector) {
        if b.is_empty() {
            self.set_empty();
            return;
        }
        self.bbox = &self.bbox + b;
        self.sync_lp_box();
        self.transform_rhs(|row, rhs| Interval::point(rhs) + b.dot_row(row));
    }

    fn inflate_ball(&mut self, rad: f64) {
        self.bbox = self.bbox.inflate(rad);
        self.sync_lp_box();
        self.transform_rhs(|row, rhs| {
            let shift = Upward::scope(|u| u.mul(u.norm2(row.as_slice()), rad));
            Interval::point(rhs) + Interval::pm(shift)
        });
    }

    fn unflat(&mut self, dm: usize, rad: f64) {
        let spread = Interval::pm(rad);
        self.bbox[dm] = self.bbox[dm] + spread;
        self.sync_lp_box();
        self.transform_rhs(|row, rhs| {
            if row[dm] == 0.0 {
                Interval::point(rhs)
            } else {
                Interval::point(rhs) + spread * row[dm]
            }
        });
    }
}

/// Collector of centered rows `row·x ∈ rhs` over a box.
struct RowSink {
    bbox: IntervalVector,
    facets: CollectFacets,
    empty: bool,
}

impl RowSink {
    fn new(bbox: IntervalVector) -> Self {
        let facets = CollectFacets::new(bbox.size());
        RowSink { bbox, facets, empty: false }
    }

    /// `row·x ≤ rhs.ub()` and, unless `upper_only`, `row·x ≥ rhs.lb()`; an
    /// exact two-sided row becomes an equality.
    fn push(&mut self, row: &IntervalVector, rhs: Interval, upper_only: bool) {
        if self.empty {
            return;
        }
        let mid = row.mid();
        let rem = (row - &IntervalVector::from_point(&mid)).dot(&self.bbox);
        let ub = (Interval::point(rhs.ub()) - rem).ub();
        if !upper_only && rem == Interval::ZERO && rhs.is_degenerated() {
            self.insert(mid, rhs.lb(), true);
            return;
        }
        if ub < f64::INFINITY {
            self.insert(mid.clone(), ub, false);
        }
        if !upper_only {
            let lb = (rem - rhs.lb()).ub();
            if lb < f64::INFINITY {
                self.insert(-mid, lb, false);
            }
        }
    }

    fn insert(&mut self, row: Vector, rhs: f64, eq: bool) {
        if self.facets.insert(row, rhs, eq, DuplicateAction::MinRhs) == Insertion::Empty {
            self.empty = true;
        }
    }
}

impl Polytope {
    /// Copy the engine choice and LP settings onto a derived polytope.
    pub(super) fn inherit(&self, p: Polytope) -> Polytope {
        let (engine, cfg) = {
            let r = self.repr.borrow();
            (r.engine, r.lp_cfg)
        };
        p.with_engine(engine).with_lp_cfg(cfg)
    }

    /// `x ↦ c + delta·(x − c)`.
    pub fn homothety(&mut self, c: &IntervalVector, delta: f64) {
        assert!(delta > 0.0, "homothety ratio must be positive");
        assert_eq!(c.size(), self.dim, "center dimension mismatch");
        let r = self.repr.get_mut();
        if !r.is(PolState::EMPTY) {
            r.homothety(c, delta);
        }
    }

    /// Minkowski sum with `[-rad, rad]ⁿ`.
    pub fn inflate(&mut self, rad: f64) {
        self.inflate_box(&IntervalVector::constant(self.dim, Interval::pm(rad)));
    }

    /// Minkowski sum with a box.
    pub fn inflate_box(&mut self, b: &IntervalVector) {
        assert_eq!(b.size(), self.dim, "box dimension mismatch");
        let r = self.repr.get_mut();
        if !r.is(PolState::EMPTY) {
            r.inflate_box(b);
        }
    }

    /// Minkowski sum with the euclidean ball of radius `rad` (outer
    /// approximation on the box).
    pub fn inflate_ball(&mut self, rad: f64) {
        let r = self.repr.get_mut();
        if rad > 0.0 && !r.is(PolState::EMPTY) {
            r.inflate_ball(rad);
        }
    }

    /// Thicken along coordinate `dm` by `rad`, typically to give volume to
    /// a polytope flat in that direction.
    pub fn unflat(&mut self, dm: usize, rad: f64) {
        assert!(dm < self.dim, "component {dm} out of range");
        let r = self.repr.get_mut();
        if rad > 0.0 && !r.is(PolState::EMPTY) {
            r.unflat(dm, rad);
        }
    }

    /// Section by the hyperplane `x_dm = x`, in the same space.
    pub fn meet_with_hyperplane(&self, dm: usize, x: f64) -> Polytope {
        assert!(dm < self.dim, "component {dm} out of range");
        let r = self.repr.borrow();
        if r.is(PolState::EMPTY) {
            return self.inherit(Polytope::empty(self.dim));
        }
        let mut nbox = r.bbox.clone();
        nbox[dm] &= Interval::point(x);
        if nbox.is_empty() {
            return self.inherit(Polytope::empty(self.dim));
        }
        let mut sink = RowSink::new(nbox.clone());
        for f in r.facets.iter() {
            let mut row = f.row().clone();
            let c = row[dm];
            row[dm] = 0.0;
            let rhs = Interval::point(f.rhs()) - nbox[dm] * c;
            sink.push(&IntervalVector::from_point(&row), rhs, !f.is_eq());
        }
        if sink.empty {
            return self.inherit(Polytope::empty(self.dim));
        }
        drop(r);
        self.inherit(Polytope::from_collect_facets(&nbox, sink.facets))
    }

    /// Outer approximation of `{x ∈ bbox : M·x + P ∈ self}` for some `M`
    /// and `P` in the enclosures: every such `x` is kept, along with part of
    /// the slack the interval remainders leave over `bbox`. The result lives
    /// in dimension `M.ncols()`.
    pub fn reverse_affine_transform(&self, m: &IntervalMatrix, p: &IntervalVector, bbox: &IntervalVector) -> Polytope {
        assert_eq!(m.nrows(), self.dim, "matrix rows must match the dimension");
        assert_eq!(p.size(), self.dim, "offset dimension mismatch");
        assert_eq!(bbox.size(), m.ncols(), "box dimension mismatch");
        let ndim = m.ncols();
        let r = self.repr.borrow();
        if r.is(PolState::EMPTY) || bbox.is_empty() {
            return self.inherit(Polytope::empty(ndim));
        }
        let mut sink = RowSink::new(bbox.clone());
        for i in 0..self.dim {
            sink.push(&m.row(i), r.bbox[i] - p[i], false);
        }
        for f in r.facets.iter() {
            let rhs = Interval::point(f.rhs()) - p.dot_row(f.row());
            sink.push(&m.row_mul(f.row()), rhs, !f.is_eq());
        }
        if sink.empty {
            return self.inherit(Polytope::empty(ndim));
        }
        drop(r);
        let res = Polytope::from_collect_facets(bbox, sink.facets);
        tracing::debug!(dim = ndim, facets = res.facets().nb_facets(), "affine preimage built");
        self.inherit(res)
    }

    /// Image by the invertible map `x ↦ M·x + P`, with `minv` enclosing
    /// `M⁻¹`.
    pub fn bijective_affine_transform(&self, m: &IntervalMatrix, minv: &IntervalMatrix, p: &IntervalVector) -> Polytope {
        assert!(m.nrows() == self.dim && m.ncols() == self.dim, "square matrix expected");
        if self.is_empty(false) {
            return self.inherit(Polytope::empty(self.dim));
        }
        let image = &m.mul_vec(&self.bbox(true)) + p;
        let shift = -&minv.mul_vec(p);
        self.reverse_affine_transform(minv, &shift, &image)
    }

    /// Image by `x ↦ M·x + P` through the vertices, cut by the image of the
    /// box. An unbounded polytope maps to the image box.
    pub fn direct_affine_transform(&self, m: &IntervalMatrix, p: &IntervalVector) -> Polytope {
        assert_eq!(m.ncols(), self.dim, "matrix columns must match the dimension");
        assert_eq!(p.size(), m.nrows(), "offset dimension mismatch");
        let ndim = m.nrows();
        if self.is_empty(true) {
            return self.inherit(Polytope::empty(ndim));
        }
        let bbox = self.bbox(true);
        let image = &m.mul_vec(&bbox) + p;
        if bbox.is_unbounded() {
            return self.inherit(Polytope::from_box(&image));
        }
        let vertices: Vec<IntervalVector> = self
            .vertices()
            .iter()
            .map(|v| &m.mul_vec(v) + p)
            .collect();
        self.hull_within(&vertices, &image)
    }

    /// `{x + t·P : x ∈ self, t ∈ T}`.
    pub fn time_elapse(&self, p: &IntervalVector, t: Interval) -> Polytope {
        assert_eq!(p.size(), self.dim, "direction dimension mismatch");
        assert!(!t.is_empty() && !t.is_unbounded(), "time range must be bounded");
        if self.is_empty(true) {
            return self.inherit(Polytope::empty(self.dim));
        }
        let bbox = self.bbox(true);
        let image = &bbox + &(p * t);
        if bbox.is_unbounded() {
            return self.inherit(Polytope::from_box(&image));
        }
        let (lo, hi) = (p * Interval::point(t.lb()), p * Interval::point(t.ub()));
        let vertices: Vec<IntervalVector> = self
            .vertices()
            .iter()
            .flat_map(|v| [v + &lo, v + &hi])
            .collect();
        self.hull_within(&vertices, &image)
    }

    pub fn minkowski_sum(&self, other: &Polytope) -> Polytope {
        assert_eq!(self.dim, other.dim, "dimension mismatch");
        if self.is_empty(true) || other.is_empty(true) {
            return self.inherit(Polytope::empty(self.dim));
        }
        let image = &self.bbox(true) + &other.bbox(true);
        if image.is_unbounded() {
            return self.inherit(Polytope::from_box(&image));
        }
        let theirs = other.vertices();
        let vertices: Vec<IntervalVector> = self
            .vertices()
            .iter()
            .flat_map(|v| theirs.iter().map(move |w| v + w))
            .collect();
        self.hull_within(&vertices, &image)
    }

    fn hull_within(&self, vertices: &[IntervalVector], bbox: &IntervalVector) -> Polytope {
        if vertices.is_empty() {
            return self.inherit(Polytope::empty(bbox.size()));
        }
        let mut res = Polytope::from_interval_vertices(vertices);
        res.meet_with_box(bbox);
        self.inherit(res)
    }
}

impl Add for &Polytope {
    type Output = Polytope;
    fn add(self, rhs: &Polytope) -> Polytope {
        self.minkowski_sum(rhs)
    }
}
