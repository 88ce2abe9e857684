//! Certified linear programming over a facet collection and a box.
//!
//! Purpose
//! - Answer "is `{x ∈ box : facets}` empty?" and "what is `max c·x` on it?"
//!   with answers that are either proved (interval enclosures backed by a
//!   primal point, a dual bound or a Farkas certificate) or flagged as
//!   approximate in the returned `LpStatus`.
//!
//! Flow of `solve`
//! - A `minilp` problem mirrors the active facets, with the box as column
//!   bounds, and runs under the wall-clock budget of `LpCfg`.
//! - A basis is rebuilt at the returned point and its inverse certified
//!   (`certify`). Dual multipliers give the upper bound; a corrected primal
//!   point gives non-emptiness and the lower bound.
//! - At a degenerate optimum that basis may prove a loose bound. The dual
//!   problem is then solved as well and its multipliers (or a basis built
//!   on their support) tighten the bound.
//! - Emptiness uses a slack problem: maximize `t ≤ 1` subject to
//!   `a·x + t ≤ b` on every inequality, equalities split in two. A negative
//!   optimum yields a Farkas certificate; otherwise the point is checked.
//! - When a certificate fails, rounded multipliers are retried with the
//!   residual absorbed over the box (`*_BBOX` flags) before settling for an
//!   `*_APPROX` answer.

mod certify;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::rc::Rc;
use std::time::Instant;

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::cfg::{LpCfg, GAP_EPS};
use crate::facet::{CollectFacets, DuplicateAction, Insertion};
use crate::interval::{BoolInterval, EqFlat, Interval, IntervalVector};
use crate::polytope::Update;
use crate::{Matrix, Vector};
use certify::{absorb_bound, check_point, nudge, recession, Basis, BasisEntry};

/// Flag set describing the outcome of a solve.
///
/// Flags without `_APPROX` or `ERROR_` are proved facts. Primal flags
/// (`EMPTY*`, `NOTEMPTY*`) and dual flags (`BOUNDED*`, `UNBOUNDED*`) combine.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LpStatus(u16);

impl LpStatus {
    pub const NONE: LpStatus = LpStatus(0);
    /// The problem changed since the last solve.
    pub const CHANGED: LpStatus = LpStatus(1 << 0);
    pub const EMPTY: LpStatus = LpStatus(1 << 1);
    pub const EMPTY_APPROX: LpStatus = LpStatus(1 << 2);
    /// Emptiness proved through the box absorption of the residual.
    pub const EMPTY_BBOX: LpStatus = LpStatus(1 << 3);
    pub const NOTEMPTY: LpStatus = LpStatus(1 << 4);
    pub const NOTEMPTY_APPROX: LpStatus = LpStatus(1 << 5);
    pub const UNBOUNDED: LpStatus = LpStatus(1 << 6);
    pub const UNBOUNDED_APPROX: LpStatus = LpStatus(1 << 7);
    pub const BOUNDED: LpStatus = LpStatus(1 << 8);
    pub const BOUNDED_APPROX: LpStatus = LpStatus(1 << 9);
    /// Bound proved through the box absorption of the residual.
    pub const BOUNDED_BBOX: LpStatus = LpStatus(1 << 10);
    /// The solver failed or exceeded its budget.
    pub const ERROR_LPCOIN: LpStatus = LpStatus(1 << 11);
    pub const ERROR_PRIMAL_CHECK: LpStatus = LpStatus(1 << 12);
    pub const ERROR_DUAL_CHECK: LpStatus = LpStatus(1 << 13);

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    /// All flags of `other` are set.
    #[inline]
    pub fn contains(self, other: LpStatus) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: LpStatus) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: LpStatus) {
        self.0 |= other.0;
    }

    pub fn is_error(self) -> bool {
        self.intersects(Self::ERROR_LPCOIN | Self::ERROR_PRIMAL_CHECK | Self::ERROR_DUAL_CHECK)
    }
}

impl BitOr for LpStatus {
    type Output = LpStatus;
    #[inline]
    fn bitor(self, rhs: LpStatus) -> LpStatus {
        LpStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for LpStatus {
    #[inline]
    fn bitor_assign(&mut self, rhs: LpStatus) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = *self;
        if s.contains(Self::CHANGED) {
            return f.write_str("Not_computed");
        }
        if s.contains(Self::ERROR_LPCOIN) {
            return f.write_str("LP_failed");
        }
        if s.contains(Self::EMPTY) {
            f.write_str("Empty")?;
            if s.contains(Self::EMPTY_BBOX) {
                f.write_str("(bbox)")?;
            }
            return Ok(());
        }
        let primal = if s.contains(Self::EMPTY_APPROX) {
            "Empty(app)-"
        } else if s.contains(Self::NOTEMPTY) {
            "NonEmpty-"
        } else if s.contains(Self::NOTEMPTY_APPROX) {
            "NonEmpty(app)-"
        } else if s.contains(Self::ERROR_PRIMAL_CHECK) {
            "Error(prim)"
        } else {
            "?(prim)"
        };
        f.write_str(primal)?;
        if s.contains(Self::UNBOUNDED) {
            f.write_str("Unbounded")
        } else if s.contains(Self::UNBOUNDED_APPROX) {
            f.write_str("Unbounded(app)")
        } else if s.contains(Self::BOUNDED) {
            f.write_str("Bounded")?;
            if s.contains(Self::BOUNDED_BBOX) {
                f.write_str("(bbox)")?;
            }
            Ok(())
        } else if s.contains(Self::BOUNDED_APPROX) {
            f.write_str("Bounded(app)")
        } else if s.contains(Self::ERROR_DUAL_CHECK) {
            f.write_str("Error(dual)")
        } else {
            f.write_str("?(dual)")
        }
    }
}

impl fmt::Debug for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LpStatus({:#06x}: {})", self.0, self)
    }
}

/// Per-constraint flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CstStat(u8);

impl CstStat {
    /// Left out of the problem; can be made active again.
    pub const INACTIVE: CstStat = CstStat(1 << 0);
    /// Shown implied by the other constraints.
    pub const REDUNDANT: CstStat = CstStat(1 << 1);

    #[inline]
    pub fn contains(self, other: CstStat) -> bool {
        self.0 & other.0 == other.0
    }

    fn set(&mut self, other: CstStat, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

/// Row as handed to the solver and the certification.
#[derive(Clone, Debug)]
pub(crate) struct LpRow {
    pub a: Vector,
    pub b: f64,
    pub eq: bool,
    /// Facet id the row comes from.
    pub id: usize,
    /// `-1` for the mirrored half of a split equality.
    pub sign: f64,
}

enum Outcome {
    Optimal(Vector),
    Infeasible,
    Unbounded,
}

/// Certified LP over a shared facet collection and a box.
#[derive(Clone, Debug)]
pub struct LpClp {
    dim: usize,
    facets: Rc<CollectFacets>,
    bbox: IntervalVector,
    objective: Vector,
    cststat: Vec<CstStat>,
    cfg: LpCfg,
    status: LpStatus,
    valobj: Interval,
    primal: IntervalVector,
    /// Multipliers by facet id (`id − 1`), then by column.
    dual: IntervalVector,
    farkas: IntervalVector,
    ray: IntervalVector,
}

impl LpClp {
    pub fn new(dim: usize, facets: Rc<CollectFacets>, bbox: &IntervalVector) -> Self {
        assert_eq!(facets.dim(), dim, "facet dimension mismatch");
        assert_eq!(bbox.size(), dim, "box dimension mismatch");
        let nstat = facets.id_bound();
        LpClp {
            dim,
            facets,
            bbox: bbox.clone(),
            objective: Vector::zeros(dim),
            cststat: vec![CstStat::default(); nstat],
            cfg: LpCfg::default(),
            status: LpStatus::CHANGED,
            valobj: Interval::ENTIRE,
            primal: IntervalVector::empty(dim),
            dual: IntervalVector::zeros(nstat + dim),
            farkas: IntervalVector::zeros(nstat),
            ray: IntervalVector::zeros(dim),
        }
    }

    /// Problem `mat·x ≤ rhs` (rows listed in `eq_set` are equalities) over
    /// the whole space.
    pub fn from_rows(mat: &Matrix, rhs: &Vector, eq_set: &[usize]) -> Self {
        let dim = mat.ncols();
        Self::new(dim, Rc::new(CollectFacets::from_rows(mat, rhs, eq_set)), &IntervalVector::entire(dim))
    }

    pub fn with_objective(mut self, objective: Vector) -> Self {
        self.set_objective(objective);
        self
    }

    pub fn with_cfg(mut self, cfg: LpCfg) -> Self {
        self.cfg = cfg;
        self
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn facets(&self) -> &CollectFacets {
        &self.facets
    }

    pub fn facets_rc(&self) -> Rc<CollectFacets> {
        Rc::clone(&self.facets)
    }

    pub fn cfg(&self) -> &LpCfg {
        &self.cfg
    }

    pub fn bbox(&self) -> &IntervalVector {
        &self.bbox
    }

    pub fn set_bbox(&mut self, bbox: &IntervalVector) {
        assert_eq!(bbox.size(), self.dim);
        self.bbox = bbox.clone();
        self.status = LpStatus::CHANGED;
    }

    pub fn objective(&self) -> &Vector {
        &self.objective
    }

    pub fn set_objective(&mut self, objective: Vector) {
        assert_eq!(objective.len(), self.dim);
        self.objective = objective;
        self.status = LpStatus::CHANGED;
    }

    /// Add `row·x ≤ rhs` (or `=`) to the shared collection, copying it first
    /// if other owners exist. Returns the facet id, `None` when an identical
    /// row was already present.
    pub fn add_constraint(&mut self, row: Vector, rhs: f64, eq: bool) -> Option<usize> {
        match Rc::make_mut(&mut self.facets).insert(row, rhs, eq, DuplicateAction::KeepRhs) {
            Insertion::New(id) | Insertion::Updated(id) => {
                self.cststat.resize(self.facets.id_bound(), CstStat::default());
                self.status = LpStatus::CHANGED;
                Some(id)
            }
            Insertion::Unchanged | Insertion::Empty => None,
        }
    }

    fn stat(&self, id: usize) -> CstStat {
        id.checked_sub(1)
            .and_then(|k| self.cststat.get(k))
            .copied()
            .unwrap_or_default()
    }

    fn stat_mut(&mut self, id: usize) -> &mut CstStat {
        assert!(id >= 1 && id <= self.facets.id_bound(), "unknown facet id {id}");
        if self.cststat.len() < self.facets.id_bound() {
            self.cststat.resize(self.facets.id_bound(), CstStat::default());
        }
        &mut self.cststat[id - 1]
    }

    pub fn set_active(&mut self, id: usize, state: bool) {
        if self.is_active(id) == state {
            return;
        }
        self.stat_mut(id).set(CstStat::INACTIVE, !state);
        self.status = LpStatus::CHANGED;
    }

    pub fn is_active(&self, id: usize) -> bool {
        !self.stat(id).contains(CstStat::INACTIVE)
    }

    pub fn is_redundant(&self, id: usize) -> bool {
        self.stat(id).contains(CstStat::REDUNDANT)
    }

    /// Ids shown redundant by the last minimization, ascending.
    pub fn redundant_ids(&self) -> Vec<usize> {
        (1..=self.cststat.len()).filter(|&id| self.is_redundant(id)).collect()
    }

    pub fn status(&self) -> LpStatus {
        self.status
    }

    /// Enclosure of the optimum: the lower end comes from a checked feasible
    /// point, the upper end from a checked dual bound.
    pub fn valobj(&self) -> Interval {
        self.valobj
    }

    pub fn feasible_point(&self) -> &IntervalVector {
        &self.primal
    }

    /// Dual multipliers of the last bound, by facet id then by column.
    pub fn bounded_row(&self) -> &IntervalVector {
        &self.dual
    }

    /// Farkas multipliers of the last emptiness proof, by facet id.
    pub fn empty_row(&self) -> &IntervalVector {
        &self.farkas
    }

    pub fn unbounded_vect(&self) -> &IntervalVector {
        &self.ray
    }

    fn reset_solution(&mut self) {
        let nstat = self.facets.id_bound();
        self.status = LpStatus::NONE;
        self.valobj = Interval::ENTIRE;
        self.primal = IntervalVector::empty(self.dim);
        self.dual = IntervalVector::zeros(nstat + self.dim);
        self.farkas = IntervalVector::zeros(nstat);
        self.ray = IntervalVector::zeros(self.dim);
    }

    /// Active rows; equalities split into two inequalities when `split`.
    fn rows(&self, split: bool) -> Vec<LpRow> {
        let mut rows = Vec::with_capacity(self.facets.nb_facets());
        for f in self.facets.iter() {
            let id = f.id();
            if !self.is_active(id) || self.is_redundant(id) || f.row().iter().all(|x| *x == 0.0) {
                continue;
            }
            rows.push(LpRow {
                a: f.row().clone(),
                b: f.rhs(),
                eq: f.is_eq() && !split,
                id,
                sign: 1.0,
            });
            if split && f.is_eq() {
                rows.push(LpRow {
                    a: -f.row(),
                    b: -f.rhs(),
                    eq: false,
                    id,
                    sign: -1.0,
                });
            }
        }
        rows
    }

    /// An active null row with an unsatisfiable bound.
    fn trivially_empty(&self) -> bool {
        self.facets.iter().any(|f| {
            self.is_active(f.id())
                && f.row().iter().all(|x| *x == 0.0)
                && (f.rhs() < 0.0 || (f.is_eq() && f.rhs() != 0.0))
        })
    }

    fn run(&self, rows: &[LpRow], objective: &Vector, bounds: &IntervalVector) -> Option<Outcome> {
        let mut pb = Problem::new(OptimizationDirection::Maximize);
        let vars: Vec<_> = (0..objective.len())
            .map(|j| pb.add_var(objective[j], (bounds[j].lb(), bounds[j].ub())))
            .collect();
        for r in rows {
            let mut expr = LinearExpr::empty();
            for (j, &v) in r.a.iter().enumerate() {
                if v != 0.0 {
                    expr.add(vars[j], v);
                }
            }
            let op = if r.eq { ComparisonOp::Eq } else { ComparisonOp::Le };
            pb.add_constraint(expr, op, r.b);
        }
        let start = Instant::now();
        let res = pb.solve();
        let elapsed = start.elapsed();
        if elapsed > self.cfg.timeout {
            tracing::warn!(?elapsed, budget = ?self.cfg.timeout, "lp solver exceeded its budget");
            return None;
        }
        Some(match res {
            Ok(sol) => Outcome::Optimal(Vector::from_iterator(vars.len(), vars.iter().map(|&v| sol[v]))),
            Err(minilp::Error::Infeasible) => Outcome::Infeasible,
            Err(minilp::Error::Unbounded) => Outcome::Unbounded,
        })
    }

    /// Optimal multipliers of the dual problem: minimize
    /// `Σ yᵢ·bᵢ + Σ uⱼ·ubⱼ − lⱼ·lbⱼ` subject to `Σ yᵢ·aᵢ + u − l = objective`,
    /// `y ≥ 0` on inequalities, `u` and `l` only on finite bounds. Returns
    /// `y` by row and `u − l` by column.
    fn run_dual(&self, rows: &[LpRow], objective: &Vector, bounds: &IntervalVector) -> Option<(Vec<f64>, Vector)> {
        let n = objective.len();
        let mut pb = Problem::new(OptimizationDirection::Minimize);
        let mut cols: Vec<LinearExpr> = (0..n).map(|_| LinearExpr::empty()).collect();
        let mut touched = vec![false; n];
        let mut yvars = Vec::with_capacity(rows.len());
        for r in rows {
            let lo = if r.eq { f64::NEG_INFINITY } else { 0.0 };
            let v = pb.add_var(r.b, (lo, f64::INFINITY));
            for (j, &a) in r.a.iter().enumerate() {
                if a != 0.0 {
                    cols[j].add(v, a);
                    touched[j] = true;
                }
            }
            yvars.push(v);
        }
        let mut bvars = Vec::with_capacity(n);
        for (j, col) in cols.iter_mut().enumerate() {
            let (lb, ub) = (bounds[j].lb(), bounds[j].ub());
            let u = ub.is_finite().then(|| pb.add_var(ub, (0.0, f64::INFINITY)));
            let l = lb.is_finite().then(|| pb.add_var(-lb, (0.0, f64::INFINITY)));
            if let Some(u) = u {
                col.add(u, 1.0);
            }
            if let Some(l) = l {
                col.add(l, -1.0);
            }
            touched[j] |= u.is_some() || l.is_some();
            bvars.push((u, l));
        }
        for (j, (col, &c)) in cols.into_iter().zip(objective.iter()).enumerate() {
            if touched[j] {
                pb.add_constraint(col, ComparisonOp::Eq, c);
            } else if c != 0.0 {
                return None;
            }
        }
        let start = Instant::now();
        let res = pb.solve();
        if start.elapsed() > self.cfg.timeout {
            tracing::warn!(budget = ?self.cfg.timeout, "dual solve exceeded its budget");
            return None;
        }
        let sol = match res {
            Ok(sol) => sol,
            Err(e) => {
                tracing::warn!(error = ?e, "dual problem not solved");
                return None;
            }
        };
        let y = yvars.iter().map(|&v| sol[v]).collect();
        let w = Vector::from_iterator(
            n,
            bvars.iter().map(|(u, l)| u.map_or(0.0, |u| sol[u]) - l.map_or(0.0, |l| sol[l])),
        );
        Some((y, w))
    }

    /// Solve the current problem. With `checkempty`, only emptiness is
    /// decided (slack problem); otherwise the objective is maximized.
    pub fn solve(&mut self, checkempty: bool) -> LpStatus {
        self.reset_solution();
        let status = if self.bbox.is_empty() || self.trivially_empty() {
            self.valobj = Interval::EMPTY;
            LpStatus::EMPTY
        } else if checkempty {
            self.solve_empty()
        } else {
            self.solve_bound()
        };
        self.status = status;
        tracing::debug!(%status, checkempty, valobj = %self.valobj, "lp solved");
        status
    }

    fn solve_bound(&mut self) -> LpStatus {
        let rows = self.rows(false);
        let objective = self.objective.clone();
        match self.run(&rows, &objective, &self.bbox) {
            None => LpStatus::ERROR_LPCOIN,
            Some(Outcome::Infeasible) => self.solve_empty(),
            Some(Outcome::Unbounded) => {
                let st = self.solve_empty();
                if st.contains(LpStatus::EMPTY) || st.is_error() {
                    return st;
                }
                let ray = self.certify_ray(&rows);
                with_ray(st, ray)
            }
            Some(Outcome::Optimal(z)) => self.certify_optimum(&rows, &z),
        }
    }

    fn certify_optimum(&mut self, rows: &[LpRow], z: &Vector) -> LpStatus {
        let Some(basis) = Basis::select(rows, z, &self.bbox) else {
            tracing::warn!("no certified basis at the lp optimum");
            return LpStatus::NOTEMPTY_APPROX | LpStatus::BOUNDED_APPROX;
        };
        let mut st = LpStatus::NONE;
        let (ok, x) = basis.correct_primal(rows, z, &self.bbox);
        match ok {
            BoolInterval::True => {
                self.set_feasible(x);
                st |= LpStatus::NOTEMPTY;
            }
            BoolInterval::False => st |= LpStatus::ERROR_PRIMAL_CHECK,
            BoolInterval::Unknown => match self.nudged_point(rows, &x) {
                Some(p) => {
                    self.set_feasible(p);
                    st |= LpStatus::NOTEMPTY;
                }
                None => st |= LpStatus::NOTEMPTY_APPROX,
            },
        }

        let objective = self.objective.clone();
        let (ok, y, val) = basis.dual(rows, &objective, &self.bbox);
        self.store_dual(rows, &basis, &y);
        let mut best = if ok.is_true() {
            Some((val.ub(), LpStatus::BOUNDED))
        } else {
            let nv = basis.neumaier(rows, &y, &objective, &self.bbox);
            nv.ub().is_finite().then(|| (nv.ub(), LpStatus::BOUNDED | LpStatus::BOUNDED_BBOX))
        };
        let reached = objective.dot(z);
        if best.map_or(true, |(ub, _)| !closes_gap(ub, reached)) {
            if let Some(better) = self.dual_guided_bound(rows, z, best.map_or(f64::INFINITY, |b| b.0)) {
                best = Some(better);
            }
        }
        match best {
            Some((ub, flags)) => {
                if flags.contains(LpStatus::BOUNDED_BBOX) {
                    tracing::debug!(%ok, "dual bound recovered through the box");
                }
                self.bound_valobj(ub);
                st | flags
            }
            None => {
                tracing::warn!(%ok, "dual bound not certified");
                if ok.is_false() {
                    st | LpStatus::ERROR_DUAL_CHECK
                } else {
                    st | LpStatus::BOUNDED_APPROX
                }
            }
        }
    }

    /// Bound from an optimal solution of the dual problem, certified twice:
    /// the multipliers as they come with the residual absorbed over the
    /// box, then through a basis built on their support. Returns the best
    /// one if it improves on `current`, and stores its multipliers.
    fn dual_guided_bound(&mut self, rows: &[LpRow], z: &Vector, current: f64) -> Option<(f64, LpStatus)> {
        let objective = self.objective.clone();
        let (ym, w) = self.run_dual(rows, &objective, &self.bbox)?;
        let mut best: Option<(f64, LpStatus)> = None;
        let direct = absorb_bound(rows, &ym, &objective, &self.bbox).ub();
        if direct < current {
            self.store_multipliers(rows, &ym, &w);
            best = Some((direct, LpStatus::BOUNDED | LpStatus::BOUNDED_BBOX));
        }
        let mut support: Vec<BasisEntry> = (0..rows.len()).filter(|&i| ym[i] != 0.0).map(BasisEntry::Row).collect();
        support.extend((0..self.dim).filter(|&j| w[j] != 0.0).map(BasisEntry::Col));
        if let Some(basis) = Basis::select_with(rows, z, &self.bbox, &support) {
            let (ok, y, val) = basis.dual(rows, &objective, &self.bbox);
            let cand = if ok.is_true() {
                Some((val.ub(), LpStatus::BOUNDED))
            } else {
                let nv = basis.neumaier(rows, &y, &objective, &self.bbox);
                nv.ub().is_finite().then(|| (nv.ub(), LpStatus::BOUNDED | LpStatus::BOUNDED_BBOX))
            };
            if let Some((ub, flags)) = cand {
                if ub < best.map_or(current, |b| b.0) {
                    self.store_dual(rows, &basis, &y);
                    best = Some((ub, flags));
                }
            }
        }
        tracing::debug!(support = support.len(), improved = best.is_some(), "dual-guided basis");
        best
    }

    fn solve_empty(&mut self) -> LpStatus {
        let n = self.dim;
        let split = self.rows(true);
        let ext: Vec<LpRow> = split
            .iter()
            .map(|r| LpRow {
                a: Vector::from_iterator(n + 1, r.a.iter().copied().chain(std::iter::once(1.0))),
                ..r.clone()
            })
            .collect();
        let mut objective = Vector::zeros(n + 1);
        objective[n] = 1.0;
        let bounds: IntervalVector = self
            .bbox
            .iter()
            .copied()
            .chain(std::iter::once(Interval::new(f64::NEG_INFINITY, 1.0)))
            .collect();

        let z = match self.run(&ext, &objective, &bounds) {
            Some(Outcome::Optimal(z)) => z,
            None => return LpStatus::ERROR_LPCOIN,
            Some(_) => {
                tracing::warn!("slack problem not solved to optimality");
                return LpStatus::ERROR_LPCOIN;
            }
        };
        if z[n] >= 0.0 {
            let x = z.rows(0, n).into_owned();
            let rows = self.rows(false);
            return self.certify_point(&rows, &x);
        }

        let Some(basis) = Basis::select(&ext, &z, &bounds) else {
            tracing::warn!(slack = z[n], "no certified basis for the emptiness proof");
            return LpStatus::EMPTY_APPROX;
        };
        // the slack column is evaluated at t = 0
        let proof: IntervalVector = self.bbox.iter().copied().chain(std::iter::once(Interval::ZERO)).collect();
        let (ok, y, val) = basis.dual(&ext, &objective, &proof);
        self.store_farkas(&ext, &basis, &y);
        if ok.is_true() && val.ub() < 0.0 {
            self.valobj = Interval::EMPTY;
            return LpStatus::EMPTY;
        }
        let nv = basis.neumaier(&ext, &y, &objective, &proof);
        if nv.ub() < 0.0 {
            self.valobj = Interval::EMPTY;
            return LpStatus::EMPTY | LpStatus::EMPTY_BBOX;
        }
        tracing::warn!(%ok, slack = z[n], "emptiness not certified");
        if ok.is_false() {
            LpStatus::ERROR_PRIMAL_CHECK
        } else {
            LpStatus::EMPTY_APPROX
        }
    }

    /// Flat of the equality rows, with the indices (into `rows`) of the
    /// equalities its points satisfy exactly.
    fn flat_of(&self, rows: &[LpRow]) -> (Option<EqFlat>, Vec<usize>) {
        let eq_idx: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].eq).collect();
        if eq_idx.is_empty() {
            return (None, Vec::new());
        }
        let eqs: Vec<(Vector, f64)> = eq_idx.iter().map(|&i| (rows[i].a.clone(), rows[i].b)).collect();
        match EqFlat::build(self.dim, &eqs, &self.bbox) {
            Some(flat) => {
                let exact = flat.pivot_rows().iter().map(|&k| eq_idx[k]).collect();
                (Some(flat), exact)
            }
            None => (None, Vec::new()),
        }
    }

    fn certify_point(&mut self, rows: &[LpRow], x: &Vector) -> LpStatus {
        let (flat, exact) = self.flat_of(rows);
        let cand = match &flat {
            Some(f) => f.project(x, false),
            None => IntervalVector::from_point(x),
        };
        if check_point(rows, &cand, &self.bbox, false, &exact).is_true() {
            self.set_feasible(cand);
            return LpStatus::NOTEMPTY;
        }
        match self.nudged_point(rows, &cand) {
            Some(p) => {
                self.set_feasible(p);
                LpStatus::NOTEMPTY
            }
            None => LpStatus::NOTEMPTY_APPROX,
        }
    }

    /// Move a nearly feasible enclosure into the interior of the inequality
    /// rows and re-check it, at most `max_iterations` times.
    fn nudged_point(&self, rows: &[LpRow], x: &IntervalVector) -> Option<IntervalVector> {
        let (flat, exact) = self.flat_of(rows);
        let inter = x & &self.bbox;
        let mut p = if inter.is_empty() { x.mid() } else { inter.mid() };
        for _ in 0..self.cfg.max_iterations.max(1) {
            nudge(rows, &mut p, &self.bbox, self.cfg.tolerance);
            let cand = match &flat {
                Some(f) => f.project(&p, false),
                None => IntervalVector::from_point(&p),
            };
            match check_point(rows, &cand, &self.bbox, false, &exact) {
                BoolInterval::True => return Some(cand),
                _ => p = cand.mid(),
            }
        }
        None
    }

    /// Certified improving ray through a secondary problem on the
    /// recession cone, normalized to `[-1, 1]ⁿ`.
    fn certify_ray(&mut self, rows: &[LpRow]) -> LpStatus {
        let cone: Vec<LpRow> = rows.iter().map(|r| LpRow { b: 0.0, ..r.clone() }).collect();
        let bounds: IntervalVector = self
            .bbox
            .iter()
            .map(|b| recession(b) & Interval::new(-1.0, 1.0))
            .collect();
        let objective = self.objective.clone();
        let mut d = match self.run(&cone, &objective, &bounds) {
            Some(Outcome::Optimal(d)) => d,
            _ => {
                tracing::warn!("ray problem not solved");
                return LpStatus::UNBOUNDED_APPROX;
            }
        };
        let (flat, exact) = self.flat_of(&cone);
        for _ in 0..self.cfg.max_iterations.max(1) {
            let cand = match &flat {
                Some(f) => f.project(&d, true),
                None => IntervalVector::from_point(&d),
            };
            let ok = check_point(&cone, &cand, &self.bbox, true, &exact);
            if ok.is_true() && cand.dot_row(&objective).lb() > 0.0 {
                self.ray = cand;
                self.valobj = Interval::new(self.valobj.lb(), f64::INFINITY);
                return LpStatus::UNBOUNDED;
            }
            nudge(&cone, &mut d, &bounds, self.cfg.tolerance);
        }
        LpStatus::UNBOUNDED_APPROX
    }

    fn set_feasible(&mut self, x: IntervalVector) {
        let lo = x.dot_row(&self.objective).lb().max(self.valobj.lb());
        self.valobj = Interval::new(lo, self.valobj.ub());
        self.primal = x;
    }

    fn bound_valobj(&mut self, ub: f64) {
        let ub = ub.min(self.valobj.ub());
        self.valobj = Interval::new(self.valobj.lb().min(ub), ub);
    }

    fn store_dual(&mut self, rows: &[LpRow], basis: &Basis, y: &IntervalVector) {
        let nstat = self.facets.id_bound();
        self.dual = IntervalVector::zeros(nstat + self.dim);
        for (k, e) in basis.entries.iter().enumerate() {
            match *e {
                BasisEntry::Row(i) => {
                    let r = &rows[i];
                    self.dual[r.id - 1] = self.dual[r.id - 1] + y[k] * Interval::from(r.sign);
                }
                BasisEntry::Col(j) => self.dual[nstat + j] = y[k],
            }
        }
    }

    fn store_multipliers(&mut self, rows: &[LpRow], y: &[f64], w: &Vector) {
        let nstat = self.facets.id_bound();
        self.dual = IntervalVector::zeros(nstat + self.dim);
        for (r, &yi) in rows.iter().zip(y) {
            let yi = if r.eq { yi } else { yi.max(0.0) };
            self.dual[r.id - 1] = self.dual[r.id - 1] + Interval::point(yi) * Interval::from(r.sign);
        }
        for (j, &wj) in w.iter().enumerate() {
            self.dual[nstat + j] = Interval::point(wj);
        }
    }

    fn store_farkas(&mut self, rows: &[LpRow], basis: &Basis, y: &IntervalVector) {
        for (k, e) in basis.entries.iter().enumerate() {
            if let BasisEntry::Row(i) = *e {
                let r = &rows[i];
                self.farkas[r.id - 1] = self.farkas[r.id - 1] + y[k] * Interval::from(r.sign);
            }
        }
    }

    /// Interval elimination on the active equalities and the degenerate box
    /// components. Consistent dependent equalities are flagged redundant.
    /// Returns the rank found, `None` when a dependent equality contradicts
    /// the others over the box.
    pub fn minimize_eqpolytope(&mut self) -> Option<usize> {
        let n = self.dim;
        let mut tri: Vec<(IntervalVector, Interval, Option<usize>)> = Vec::new();
        for j in (0..n).filter(|&j| self.bbox[j].is_degenerated()) {
            let mut row = IntervalVector::zeros(n);
            row[j] = Interval::ONE;
            tri.push((row, Interval::from(self.bbox[j].mid()), Some(j)));
        }
        let eq_ids: Vec<usize> = self.facets.iter().filter(|f| f.is_eq()).map(|f| f.id()).collect();
        for id in eq_ids {
            if !self.is_active(id) || self.is_redundant(id) {
                continue;
            }
            let Some(f) = self.facets.get(id) else { continue };
            let mut row = IntervalVector::from_point(f.row());
            let mut rhs = Interval::from(f.rhs());
            for (prow, prhs, pcol) in &tri {
                let Some(c) = *pcol else { continue };
                let piv = row[c] / prow[c];
                if piv == Interval::ZERO {
                    continue;
                }
                for k in 0..n {
                    row[k] = row[k] - prow[k] * piv;
                }
                row[c] = Interval::ZERO;
                rhs = rhs - *prhs * piv;
            }
            let best = (0..n)
                .map(|j| (j, row[j].mig()))
                .filter(|(_, m)| *m > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match best {
                Some((c, _)) => tri.push((row, rhs, Some(c))),
                None => {
                    if rhs.contains(0.0) {
                        self.stat_mut(id).set(CstStat::REDUNDANT, true);
                        continue;
                    }
                    // numerically null row: absorb what is left over the box
                    let mut r = rhs;
                    for j in 0..n {
                        if row[j].mag() == 0.0 {
                            continue;
                        }
                        r = r - self.bbox[j] * row[j];
                        if r.contains(0.0) {
                            break;
                        }
                    }
                    if !r.contains(0.0) {
                        tracing::debug!(id, "contradictory equality");
                        return None;
                    }
                    tri.push((row, rhs, None));
                }
            }
        }
        Some(tri.len())
    }

    /// Whether the problem is proved empty.
    pub fn check_emptiness(&mut self) -> bool {
        self.solve(true).contains(LpStatus::EMPTY)
    }

    /// Tighten every box bound to the certified optimum in its direction.
    pub fn minimize_box(&mut self) -> Update {
        let n = self.dim;
        let saved = self.objective.clone();
        let mut changed = false;
        for sign in [1.0, -1.0] {
            for i in 0..n {
                let mut a = Vector::zeros(n);
                a[i] = sign;
                self.objective = a;
                let st = self.solve(false);
                if st.contains(LpStatus::EMPTY) {
                    self.objective = saved;
                    return Update::Empty;
                }
                if !st.contains(LpStatus::BOUNDED) {
                    continue;
                }
                let ub = self.valobj.ub();
                let b = self.bbox[i];
                let nb = if sign > 0.0 {
                    Interval::new(b.lb(), b.ub().min(ub))
                } else {
                    Interval::new(b.lb().max(-ub), b.ub())
                };
                if nb.is_empty() {
                    self.objective = saved;
                    return Update::Empty;
                }
                if nb != b {
                    self.bbox[i] = nb;
                    changed = true;
                }
            }
        }
        self.objective = saved;
        self.status = LpStatus::CHANGED;
        if changed {
            Update::Changed
        } else {
            Update::Unchanged
        }
    }

    /// Flag every inequality implied by the others (and the box) as
    /// redundant: its row is maximized with the constraint switched off and
    /// compared to its bound, up to `tolerance`. Returns the number of
    /// constraints kept, `None` when the problem is proved empty.
    pub fn minimize_polytope(&mut self, tolerance: Interval, checkempty: bool, checkbox: bool) -> Option<usize> {
        self.minimize_eqpolytope()?;
        if checkempty && self.check_emptiness() {
            return None;
        }
        if checkbox && self.minimize_box() == Update::Empty {
            return None;
        }
        let saved = self.objective.clone();
        let ids: Vec<(usize, bool)> = self.facets.iter().map(|f| (f.id(), f.is_eq())).collect();
        let mut kept = 0;
        for (id, eq) in ids.into_iter().rev() {
            if !self.is_active(id) || self.is_redundant(id) {
                continue;
            }
            if eq {
                kept += 1;
                continue;
            }
            let Some(f) = self.facets.get(id) else { continue };
            let (row, rhs) = (f.row().clone(), f.rhs());
            self.set_active(id, false);
            self.objective = row;
            let st = self.solve(false);
            if st.contains(LpStatus::EMPTY) {
                self.set_active(id, true);
                self.objective = saved;
                return None;
            }
            if st.contains(LpStatus::BOUNDED)
                && self.valobj.ub() <= rhs + tolerance.ub()
                && self.valobj.lb() <= rhs + tolerance.lb()
            {
                self.stat_mut(id).set(CstStat::REDUNDANT, true);
                continue;
            }
            kept += 1;
            self.set_active(id, true);
        }
        self.objective = saved;
        tracing::debug!(kept, redundant = self.redundant_ids().len(), "lp minimization");
        Some(kept)
    }
}

/// A certified ray proves unboundedness only from a proved feasible point;
/// after an approximate one it is downgraded.
fn with_ray(primal: LpStatus, ray: LpStatus) -> LpStatus {
    if ray.contains(LpStatus::UNBOUNDED) && !primal.contains(LpStatus::NOTEMPTY) {
        primal | LpStatus::UNBOUNDED_APPROX
    } else {
        primal | ray
    }
}

/// Whether a certified upper bound is within `GAP_EPS` of the value the
/// solver reached.
fn closes_gap(ub: f64, reached: f64) -> bool {
    ub - reached <= GAP_EPS * (1.0 + reached.abs())
}

#[cfg(test)]
mod tests;
