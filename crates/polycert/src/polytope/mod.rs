//! Certified convex polytopes: bounding box + facets, with lazily derived
//! vertex enumeration and LP model.
//!
//! Purpose
//! - `Polytope` owns a box and a shared facet collection and keeps the
//!   derived forms (F2V build, LP model) in a cache guarded by `PolState`
//!   flags. Every mutation clears the flags of the forms it invalidates.
//! - Geometry never fails: infeasibility moves the polytope to the absorbing
//!   `EMPTY` state. Contract violations (dimension mismatches) panic.
//!
//! Layout
//! - `query`: accessors, bounds, containment, lazy resolution of emptiness,
//!   box and minimization through the selected `Engine`.
//! - `ops`: constraint addition, meets and unions.
//! - `transform`: inflations, homothety, affine maps, sums.
//!
//! Caches sit behind a `RefCell` so that queries stay `&self`; a query
//! borrows the cache once and never calls back into the public API while
//! holding it.

mod ops;
mod query;
mod transform;

use std::cell::RefCell;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::path::Path;
use std::rc::Rc;

use crate::cfg::LpCfg;
use crate::dd::{DdBuildF2V, DdBuildV2F};
use crate::facet::CollectFacets;
use crate::interval::{inverse_enclosure, Interval, IntervalMatrix, IntervalVector};
use crate::io::{self, IoError};
use crate::lp::LpClp;
use crate::zonotope::{Parallelepiped, Zonotope};
use crate::Vector;

/// Outcome of an operation that may shrink a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Update {
    /// The result is empty.
    Empty,
    Unchanged,
    Changed,
}

/// Validity flags of a polytope and of its derived forms.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PolState(u16);

impl PolState {
    pub const NONE: PolState = PolState(0);
    pub const EMPTY: PolState = PolState(1 << 0);
    pub const NOTEMPTY: PolState = PolState(1 << 1);
    /// Redundant facets removed.
    pub const MINIMIZED: PolState = PolState(1 << 2);
    /// The box is the tight enclosure of the facets.
    pub const BOXUPDATED: PolState = PolState(1 << 3);
    pub const F2V_READY: PolState = PolState(1 << 4);
    pub const CLP_READY: PolState = PolState(1 << 5);

    /// Fresh non-empty box.
    pub const INIT: PolState = PolState(Self::NOTEMPTY.0 | Self::MINIMIZED.0 | Self::BOXUPDATED.0);
    pub const EMPTY_SET: PolState = PolState(Self::EMPTY.0 | Self::MINIMIZED.0 | Self::BOXUPDATED.0);

    #[inline]
    pub fn contains(self, other: PolState) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: PolState) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: PolState) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for PolState {
    type Output = PolState;
    fn bitor(self, rhs: PolState) -> PolState {
        PolState(self.0 | rhs.0)
    }
}

impl BitAnd for PolState {
    type Output = PolState;
    fn bitand(self, rhs: PolState) -> PolState {
        PolState(self.0 & rhs.0)
    }
}

impl BitOrAssign for PolState {
    fn bitor_assign(&mut self, rhs: PolState) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 6] = ["EMPTY", "NOTEMPTY", "MINIMIZED", "BOXUPDATED", "F2V_READY", "CLP_READY"];
        let set: Vec<&str> = NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, n)| *n)
            .collect();
        write!(f, "PolState({})", set.join("|"))
    }
}

/// How emptiness, box, minimization and row bounds are resolved when no
/// vertex enumeration is ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Engine {
    /// Facet to vertex enumeration.
    #[default]
    Dd,
    /// Certified LP, falling back to enumeration when it cannot conclude.
    Lp,
}

/// Mutable part of a polytope.
#[derive(Debug)]
pub(crate) struct Repr {
    pub dim: usize,
    pub bbox: IntervalVector,
    pub facets: Rc<CollectFacets>,
    pub f2v: Option<Box<DdBuildF2V>>,
    pub lp: Option<Box<LpClp>>,
    pub state: PolState,
    pub engine: Engine,
    pub lp_cfg: LpCfg,
}

impl Repr {
    fn new(dim: usize, bbox: IntervalVector, facets: Rc<CollectFacets>, state: PolState) -> Self {
        Repr {
            dim,
            bbox,
            facets,
            f2v: None,
            lp: None,
            state,
            engine: Engine::default(),
            lp_cfg: LpCfg::default(),
        }
    }

    #[inline]
    pub fn is(&self, flag: PolState) -> bool {
        self.state.contains(flag)
    }

    pub fn set_empty(&mut self) {
        self.state = PolState::EMPTY_SET;
        self.bbox = IntervalVector::empty(self.dim);
        self.f2v = None;
        self.lp = None;
        self.facets = Rc::new(CollectFacets::new(self.dim));
    }

    /// Writable facets; derived forms holding the collection are dropped
    /// first so the write does not copy.
    pub fn facets_mut(&mut self) -> &mut CollectFacets {
        self.drop_lp();
        Rc::make_mut(&mut self.facets)
    }

    pub fn drop_lp(&mut self) {
        self.lp = None;
        self.state.remove(PolState::CLP_READY);
    }

    pub fn drop_f2v(&mut self) {
        self.f2v = None;
        self.state.remove(PolState::F2V_READY);
    }

    /// The box changed; keep the LP model in step.
    pub fn sync_lp_box(&mut self) {
        if let Some(lp) = self.lp.as_mut() {
            lp.set_bbox(&self.bbox);
        }
    }

    /// Flags cleared by any change of the constraint system.
    pub fn constraints_changed(&mut self) {
        self.state
            .remove(PolState::MINIMIZED | PolState::BOXUPDATED | PolState::NOTEMPTY);
    }
}

/// Bounded (or not) convex polytope in `ℝⁿ` with certified operations.
pub struct Polytope {
    dim: usize,
    repr: RefCell<Repr>,
}

impl Polytope {
    fn from_repr(repr: Repr) -> Self {
        Polytope {
            dim: repr.dim,
            repr: RefCell::new(repr),
        }
    }

    /// Whole space.
    pub fn new(dim: usize) -> Self {
        Self::from_repr(Repr::new(
            dim,
            IntervalVector::entire(dim),
            Rc::new(CollectFacets::new(dim)),
            PolState::INIT,
        ))
    }

    pub fn empty(dim: usize) -> Self {
        let mut p = Self::new(dim);
        p.repr.get_mut().set_empty();
        p
    }

    pub fn from_box(bbox: &IntervalVector) -> Self {
        let dim = bbox.size();
        if bbox.is_empty() {
            return Self::empty(dim);
        }
        Self::from_repr(Repr::new(dim, bbox.clone(), Rc::new(CollectFacets::new(dim)), PolState::INIT))
    }

    /// Hull of a finite point set.
    pub fn from_vertices(vertices: &[Vector]) -> Self {
        let boxed: Vec<IntervalVector> = vertices.iter().map(IntervalVector::from_point).collect();
        Self::from_interval_vertices(&boxed)
    }

    /// Outer approximation of the hull of a set of boxes: hull of the
    /// midpoints, with every facet pushed out to enclose the boxes.
    pub fn from_interval_vertices(vertices: &[IntervalVector]) -> Self {
        assert!(!vertices.is_empty(), "no vertex to build a polytope from");
        let dim = vertices[0].size();
        let mut dd = DdBuildV2F::new(1, &vertices[0].mid());
        for (i, v) in vertices.iter().enumerate().skip(1) {
            dd.add_point(i + 1, &v.mid());
        }
        let mut facets = dd.into_facets();
        let mut bbox = facets.extract_box();
        facets.encompass_vertices(vertices, &mut bbox, true);
        facets.renumber();
        tracing::debug!(dim, vertices = vertices.len(), facets = facets.nb_facets(), "hull built");
        Self::from_repr(Repr::new(dim, bbox, Rc::new(facets), PolState::INIT))
    }

    /// Smallest polytope with the directions of `template` enclosing the
    /// boxes.
    pub fn from_vertices_with_facets(vertices: &[IntervalVector], template: &CollectFacets) -> Self {
        let dim = template.dim();
        if vertices.is_empty() {
            return Self::empty(dim);
        }
        let mut facets = template.clone();
        let mut bbox = IntervalVector::empty(dim);
        for v in vertices {
            bbox |= v;
        }
        facets.encompass_vertices(vertices, &mut bbox, true);
        Self::from_repr(Repr::new(dim, bbox, Rc::new(facets), PolState::INIT))
    }

    /// Box intersected with `row·x ≤ rhs` for each constraint, optionally
    /// minimized.
    pub fn from_facets(bbox: &IntervalVector, constraints: &[(Vector, f64)], minimize: bool) -> Self {
        let mut p = Self::from_box(bbox);
        for (row, rhs) in constraints {
            p.add_constraint(row.clone(), *rhs, 0.0);
        }
        {
            let r = p.repr.get_mut();
            if !r.is(PolState::EMPTY) {
                r.state = PolState::NONE;
                r.drop_f2v();
            }
        }
        if minimize {
            p.minimize_constraints();
        }
        p
    }

    /// Box `z + A·[-1, 1]ⁿ` cut by the bands of the rows of a guaranteed
    /// inverse of `A`.
    pub fn from_parallelepiped(par: &Parallelepiped) -> Self {
        let mut p = Self::from_box(&par.bbox());
        if !par.is_square() {
            return p;
        }
        let Some(u) = inverse_enclosure(par.generators()) else {
            tracing::warn!("singular parallelepiped, box only");
            return p;
        };
        let z = IntervalVector::from_point(par.center());
        for i in 0..u.nrows() {
            let row = u.row(i);
            p.add_constraint_band(&row, row.dot(&z) + Interval::pm(1.0), 0.0);
        }
        let r = p.repr.get_mut();
        if !r.is(PolState::EMPTY) {
            r.bbox = par.bbox();
            r.sync_lp_box();
        }
        p
    }

    /// Hull of the generator sign combinations, pushed out to enclose the
    /// zonotope exactly.
    pub fn from_zonotope(zon: &Zonotope) -> Self {
        let dim = zon.dim();
        let m = zon.nb_generators();
        let a = IntervalMatrix::from_matrix(zon.generators());
        let z = IntervalVector::from_point(zon.center());
        let corner = |v: &Vector| &z + &a.mul_point(v);
        let mut v = Vector::from_element(m, -1.0);
        let mut dd = DdBuildV2F::new(1, &corner(&v).mid());
        let mut id = 2;
        // binary counter over the signs
        let mut k = 0;
        while k < m {
            while k < m && v[k] == 1.0 {
                v[k] = -1.0;
                k += 1;
            }
            if k < m {
                v[k] = 1.0;
                k = 0;
                dd.add_vertex(id, &corner(&v));
                id += 1;
            }
        }
        let mut facets = dd.into_facets();
        let range = IntervalVector::constant(m, Interval::pm(1.0));
        facets.encompass_zonotope(&z, &a, &range, true);
        Self::from_repr(Repr::new(dim, zon.bbox(), Rc::new(facets), PolState::INIT))
    }

    /// Box intersected with a facet collection; axis-aligned facets move
    /// into the box.
    pub fn from_collect_facets(bbox: &IntervalVector, mut facets: CollectFacets) -> Self {
        let dim = facets.dim();
        assert_eq!(bbox.size(), dim, "box dimension mismatch");
        let bbox = bbox & &facets.extract_box();
        if bbox.is_empty() {
            return Self::empty(dim);
        }
        facets.renumber();
        Self::from_repr(Repr::new(dim, bbox, Rc::new(facets), PolState::NONE))
    }

    pub fn from_ine_file(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let facets = io::read_ine(path)?;
        let dim = facets.dim();
        Ok(Self::from_collect_facets(&IntervalVector::entire(dim), facets))
    }

    pub fn from_ext_file(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let (dim, vertices) = io::read_ext(path)?;
        if vertices.is_empty() {
            return Ok(Self::empty(dim));
        }
        Ok(Self::from_vertices(&vertices))
    }

    pub fn with_engine(self, engine: Engine) -> Self {
        {
            let mut r = self.repr.borrow_mut();
            r.engine = engine;
        }
        self
    }

    pub fn with_lp_cfg(self, cfg: LpCfg) -> Self {
        {
            let mut r = self.repr.borrow_mut();
            r.lp_cfg = cfg;
            r.drop_lp();
        }
        self
    }

    pub fn engine(&self) -> Engine {
        self.repr.borrow().engine
    }

    pub fn state(&self) -> PolState {
        self.repr.borrow().state
    }
}

impl Clone for Polytope {
    /// Shares the facet collection; derived forms are rebuilt on demand.
    fn clone(&self) -> Self {
        let r = self.repr.borrow();
        let keep = PolState::EMPTY | PolState::NOTEMPTY | PolState::MINIMIZED | PolState::BOXUPDATED;
        let mut repr = Repr::new(r.dim, r.bbox.clone(), Rc::clone(&r.facets), r.state & keep);
        repr.engine = r.engine;
        repr.lp_cfg = r.lp_cfg;
        Self::from_repr(repr)
    }
}

impl fmt::Debug for Polytope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.repr.borrow();
        f.debug_struct("Polytope")
            .field("dim", &self.dim)
            .field("state", &r.state)
            .field("bbox", &r.bbox)
            .field("facets", &r.facets.nb_facets())
            .finish()
    }
}

impl fmt::Display for Polytope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.repr.borrow();
        if r.is(PolState::EMPTY) {
            return writeln!(f, "Polytope(empty dim {})", self.dim);
        }
        writeln!(f, "Polytope(bbox {}) : ", r.bbox)?;
        write!(f, "{}", r.facets)?;
        writeln!(f, "EndPolytope")
    }
}

#[cfg(test)]
mod tests;
