//! Certification of floating-point LP answers.
//!
//! The solver only hands back a primal point. Around that point a square
//! basis of tight rows and column bounds is rebuilt, inverted in floating
//! point and corrected into a guaranteed enclosure of the exact inverse.
//! Dual multipliers, emptiness certificates and corrected primal points are
//! derived from that enclosure and re-checked in interval arithmetic.

use super::LpRow;
use crate::cfg::{RANK_EPS, TIGHT_EPS};
use crate::interval::{inverse_enclosure, BoolInterval, Interval, IntervalMatrix, IntervalVector};
use crate::{Matrix, Vector};

/// One row of a basis: a problem row or a unit row on a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BasisEntry {
    Row(usize),
    Col(usize),
}

/// Square basis with a guaranteed enclosure of its inverse.
#[derive(Clone, Debug)]
pub(crate) struct Basis {
    pub entries: Vec<BasisEntry>,
    pub inv: IntervalMatrix,
}

fn unit(n: usize, j: usize) -> Vector {
    let mut e = Vector::zeros(n);
    e[j] = 1.0;
    e
}

impl Basis {
    /// Basis around `z`: equalities first, then rows and finite column
    /// bounds by increasing relative slack, free columns last. Candidates
    /// dependent on the rows already chosen are skipped.
    pub fn select(rows: &[LpRow], z: &Vector, bounds: &IntervalVector) -> Option<Basis> {
        Self::select_with(rows, z, bounds, &[])
    }

    /// Same as `select`, with the `preferred` entries taken before any
    /// other. At a degenerate vertex the support of an optimal dual
    /// solution picks the tight rows whose multipliers prove the optimum.
    pub fn select_with(rows: &[LpRow], z: &Vector, bounds: &IntervalVector, preferred: &[BasisEntry]) -> Option<Basis> {
        let n = z.len();
        let key = |s: f64| if s <= TIGHT_EPS { 0.0 } else { s };
        let mut cands: Vec<(f64, BasisEntry)> = Vec::with_capacity(rows.len() + n);
        for (i, r) in rows.iter().enumerate() {
            let s = if r.eq { -1.0 } else { key(((r.b - r.a.dot(z)) / (1.0 + r.b.abs())).abs()) };
            cands.push((s, BasisEntry::Row(i)));
        }
        for j in 0..n {
            let d = [bounds[j].lb(), bounds[j].ub()]
                .into_iter()
                .filter(|b| b.is_finite())
                .map(|b| ((z[j] - b) / (1.0 + b.abs())).abs())
                .fold(f64::INFINITY, f64::min);
            cands.push((key(d), BasisEntry::Col(j)));
        }
        for c in cands.iter_mut() {
            if preferred.contains(&c.1) {
                c.0 = -2.0;
            }
        }
        cands.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut q: Vec<Vector> = Vec::with_capacity(n);
        let mut entries = Vec::with_capacity(n);
        for (_, e) in cands {
            if entries.len() == n {
                break;
            }
            let v = match e {
                BasisEntry::Row(i) => rows[i].a.clone(),
                BasisEntry::Col(j) => unit(n, j),
            };
            let norm = v.norm();
            if !(norm > 0.0) {
                continue;
            }
            let mut w = v;
            // twice, for orthogonality
            for _ in 0..2 {
                for u in &q {
                    let c = u.dot(&w);
                    w.axpy(-c, u, 1.0);
                }
            }
            let wn = w.norm();
            if wn <= RANK_EPS * norm {
                continue;
            }
            q.push(w / wn);
            entries.push(e);
        }
        if entries.len() < n {
            return None;
        }
        let b = Matrix::from_fn(n, n, |k, c| match entries[k] {
            BasisEntry::Row(i) => rows[i].a[c],
            BasisEntry::Col(j) => {
                if j == c {
                    1.0
                } else {
                    0.0
                }
            }
        });
        let inv = inverse_enclosure(&b)?;
        Some(Basis { entries, inv })
    }

    /// Multipliers `c·B⁻¹` and the bound they prove on `c·z`: `Σ yᵢ·bᵢ`
    /// over rows plus `yⱼ·boxⱼ` over columns. Inequality multipliers must
    /// be nonnegative for the bound to hold.
    pub fn dual(&self, rows: &[LpRow], c: &Vector, proof_box: &IntervalVector) -> (BoolInterval, IntervalVector, Interval) {
        let y = self.inv.row_mul(c);
        let mut ok = BoolInterval::True;
        let mut val = Interval::ZERO;
        for (k, e) in self.entries.iter().enumerate() {
            match *e {
                BasisEntry::Row(i) => {
                    if !rows[i].eq {
                        if y[k].ub() < 0.0 {
                            return (BoolInterval::False, y, Interval::ENTIRE);
                        }
                        if y[k].lb() < 0.0 {
                            ok = ok.and(BoolInterval::Unknown);
                        }
                    }
                    val += y[k] * Interval::from(rows[i].b);
                }
                BasisEntry::Col(j) => {
                    if y[k] != Interval::ZERO {
                        val += y[k] * proof_box[j];
                    }
                }
            }
        }
        if !val.ub().is_finite() {
            ok = ok.and(BoolInterval::Unknown);
        }
        (ok, y, val)
    }

    /// Bound from rounded multipliers (nonnegative on inequalities): the
    /// residual `c − Σ yᵢ·aᵢ` is absorbed over `proof_box`. Sound for any
    /// such multipliers; finite only when the residual vanishes on the
    /// unbounded columns.
    pub fn neumaier(&self, rows: &[LpRow], y: &IntervalVector, c: &Vector, proof_box: &IntervalVector) -> Interval {
        let mut mult = vec![0.0; rows.len()];
        for (k, e) in self.entries.iter().enumerate() {
            if let BasisEntry::Row(i) = *e {
                mult[i] = y[k].mid();
            }
        }
        absorb_bound(rows, &mult, c, proof_box)
    }

    /// Enclosure of a point satisfying every basis row, obtained from `z` by
    /// removing the basis violations; and whether it satisfies the rows and
    /// columns outside the basis.
    pub fn correct_primal(&self, rows: &[LpRow], z: &Vector, bounds: &IntervalVector) -> (BoolInterval, IntervalVector) {
        let zi = IntervalVector::from_point(z);
        let err: IntervalVector = self
            .entries
            .iter()
            .map(|e| match *e {
                BasisEntry::Row(i) => {
                    let r = zi.dot_row(&rows[i].a) - Interval::from(rows[i].b);
                    if rows[i].eq {
                        r
                    } else {
                        r.max(&Interval::ZERO)
                    }
                }
                BasisEntry::Col(j) => {
                    if z[j] > bounds[j].ub() {
                        Interval::from(z[j]) - Interval::from(bounds[j].ub())
                    } else if z[j] < bounds[j].lb() {
                        Interval::from(z[j]) - Interval::from(bounds[j].lb())
                    } else {
                        Interval::ZERO
                    }
                }
            })
            .collect();
        let corrected = &zi - &self.inv.mul_vec(&err);
        let in_basis = |e: BasisEntry| self.entries.contains(&e);
        let mut ok = BoolInterval::True;
        for (i, r) in rows.iter().enumerate() {
            if in_basis(BasisEntry::Row(i)) {
                continue;
            }
            ok = ok.and(row_holds(r, &corrected, false));
            if ok.is_false() {
                return (ok, corrected);
            }
        }
        for j in 0..z.len() {
            if in_basis(BasisEntry::Col(j)) {
                continue;
            }
            ok = ok.and(inside(&corrected[j], &bounds[j]));
            if ok.is_false() {
                break;
            }
        }
        (ok, corrected)
    }
}

/// `Σ yᵢ·bᵢ + (c − Σ yᵢ·aᵢ)·proof_box` for one float multiplier per row,
/// clamped to nonnegative on inequalities. An upper bound of `c·x` over the
/// rows and `proof_box` whatever the multipliers.
pub(crate) fn absorb_bound(rows: &[LpRow], mult: &[f64], c: &Vector, proof_box: &IntervalVector) -> Interval {
    let mut residual = IntervalVector::from_point(c);
    let mut val = Interval::ZERO;
    for (r, &m) in rows.iter().zip(mult) {
        let yi = if r.eq { m } else { m.max(0.0) };
        if yi == 0.0 || !yi.is_finite() {
            continue;
        }
        let yi = Interval::point(yi);
        for (res, a) in residual.iter_mut().zip(r.a.iter()) {
            *res = *res - yi * Interval::from(*a);
        }
        val += yi * Interval::from(r.b);
    }
    val + residual.dot(proof_box)
}

/// Whether `a·x ≤ b` (`= b` for equalities; `≤ 0` / `= 0` for a direction)
/// holds on the whole enclosure `x`.
pub(crate) fn row_holds(r: &LpRow, x: &IntervalVector, direction: bool) -> BoolInterval {
    let mut v = x.dot_row(&r.a);
    if !direction {
        v = v - Interval::from(r.b);
    }
    if r.eq {
        if v == Interval::ZERO {
            BoolInterval::True
        } else if v.contains(0.0) {
            BoolInterval::Unknown
        } else {
            BoolInterval::False
        }
    } else if v.ub() <= 0.0 {
        BoolInterval::True
    } else if v.lb() > 0.0 {
        BoolInterval::False
    } else {
        BoolInterval::Unknown
    }
}

fn inside(x: &Interval, b: &Interval) -> BoolInterval {
    if x.is_subset(b) {
        BoolInterval::True
    } else if x.is_disjoint(b) {
        BoolInterval::False
    } else {
        BoolInterval::Unknown
    }
}

/// Check a point (or direction) against every row and the box (or its
/// recession cone), skipping the rows listed in `exact`.
pub(crate) fn check_point(rows: &[LpRow], x: &IntervalVector, bounds: &IntervalVector, direction: bool, exact: &[usize]) -> BoolInterval {
    let mut ok = BoolInterval::True;
    for (i, r) in rows.iter().enumerate() {
        if exact.contains(&i) {
            continue;
        }
        ok = ok.and(row_holds(r, x, direction));
        if ok.is_false() {
            return ok;
        }
    }
    for j in 0..x.size() {
        let cone = if direction { recession(&bounds[j]) } else { bounds[j] };
        ok = ok.and(inside(&x[j], &cone));
    }
    ok
}

/// Directions along which an interval stays unbounded.
pub(crate) fn recession(b: &Interval) -> Interval {
    let lo = if b.lb().is_finite() { 0.0 } else { f64::NEG_INFINITY };
    let hi = if b.ub().is_finite() { 0.0 } else { f64::INFINITY };
    Interval::new(lo, hi)
}

/// Push a point away from the inequality rows it violates (or touches),
/// one projection per row, and clamp it into `bounds`.
pub(crate) fn nudge(rows: &[LpRow], x: &mut Vector, bounds: &IntervalVector, margin: f64) {
    for r in rows.iter().filter(|r| !r.eq) {
        let err = r.a.dot(x) - r.b;
        let n2 = r.a.norm_squared();
        if err + margin >= 0.0 && n2 > 0.0 {
            x.axpy(-(1.1 * err.max(0.0) + margin) / n2, &r.a, 1.0);
        }
    }
    for (j, xj) in x.iter_mut().enumerate() {
        let (lb, ub) = (bounds[j].lb(), bounds[j].ub());
        if lb <= ub {
            *xj = xj.clamp(lb, ub);
        }
    }
}
