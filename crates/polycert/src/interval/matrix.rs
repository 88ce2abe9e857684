//! Interval matrices, guaranteed inverses and equality flats.

use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Sub};

use super::{Interval, IntervalVector, Upward};
use crate::cfg::PIVOT_EPS;
use crate::{Matrix, Vector};

/// Dense row-major matrix of intervals.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<Interval>,
}

impl IntervalMatrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![Interval::ZERO; nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = Interval::ONE;
        }
        m
    }

    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> Interval) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j));
            }
        }
        Self { nrows, ncols, data }
    }

    pub fn from_matrix(m: &Matrix) -> Self {
        Self::from_fn(m.nrows(), m.ncols(), |i, j| Interval::point(m[(i, j)]))
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn row(&self, i: usize) -> IntervalVector {
        self.data[i * self.ncols..(i + 1) * self.ncols].iter().copied().collect()
    }

    pub fn col(&self, j: usize) -> IntervalVector {
        (0..self.nrows).map(|i| self[(i, j)]).collect()
    }

    pub fn mid(&self) -> Matrix {
        Matrix::from_fn(self.nrows, self.ncols, |i, j| self[(i, j)].mid())
    }

    /// Radius (upper bound) of each entry.
    pub fn rad(&self) -> Matrix {
        Matrix::from_fn(self.nrows, self.ncols, |i, j| self[(i, j)].rad())
    }

    pub fn transpose(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[(j, i)])
    }

    /// Enclosure of `self · v`.
    pub fn mul_vec(&self, v: &IntervalVector) -> IntervalVector {
        assert_eq!(self.ncols, v.size());
        (0..self.nrows)
            .map(|i| {
                (0..self.ncols).fold(Interval::ZERO, |acc, j| acc + self[(i, j)] * v[j])
            })
            .collect()
    }

    /// Enclosure of `self · v` for a point vector.
    pub fn mul_point(&self, v: &Vector) -> IntervalVector {
        assert_eq!(self.ncols, v.len());
        (0..self.nrows)
            .map(|i| {
                (0..self.ncols)
                    .filter(|&j| v[j] != 0.0)
                    .fold(Interval::ZERO, |acc, j| acc + self[(i, j)] * v[j])
            })
            .collect()
    }

    /// Enclosure of `rowᵀ · self`.
    pub fn row_mul(&self, row: &Vector) -> IntervalVector {
        assert_eq!(self.nrows, row.len());
        (0..self.ncols)
            .map(|j| {
                (0..self.nrows)
                    .filter(|&i| row[i] != 0.0)
                    .fold(Interval::ZERO, |acc, i| acc + self[(i, j)] * row[i])
            })
            .collect()
    }

    /// Enclosure of `vᵀ · self` for an interval row.
    pub fn vec_mul(&self, v: &IntervalVector) -> IntervalVector {
        assert_eq!(self.nrows, v.size());
        (0..self.ncols)
            .map(|j| (0..self.nrows).fold(Interval::ZERO, |acc, i| acc + self[(i, j)] * v[i]))
            .collect()
    }

    /// Enclosure of `self · m` for a point matrix.
    pub fn mul_matrix(&self, m: &Matrix) -> Self {
        assert_eq!(self.ncols, m.nrows());
        Self::from_fn(self.nrows, m.ncols(), |i, j| {
            (0..self.ncols)
                .filter(|&k| m[(k, j)] != 0.0)
                .fold(Interval::ZERO, |acc, k| acc + self[(i, k)] * m[(k, j)])
        })
    }

    /// Upper bound of the induced ∞-norm (max absolute row sum).
    pub fn norm_inf_ub(&self) -> f64 {
        Upward::scope(|up| {
            (0..self.nrows)
                .map(|i| up.sum((0..self.ncols).map(|j| self[(i, j)].mag())))
                .fold(0.0, f64::max)
        })
    }

    /// Every entry widened by `[-r, r]`.
    pub fn inflate(&self, r: f64) -> Self {
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(|x| x.inflate(r)).collect(),
        }
    }
}

impl Index<(usize, usize)> for IntervalMatrix {
    type Output = Interval;
    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &Interval {
        &self.data[i * self.ncols + j]
    }
}

impl IndexMut<(usize, usize)> for IntervalMatrix {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Interval {
        &mut self.data[i * self.ncols + j]
    }
}

impl Add for &IntervalMatrix {
    type Output = IntervalMatrix;
    fn add(self, rhs: &IntervalMatrix) -> IntervalMatrix {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        IntervalMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| *a + *b).collect(),
        }
    }
}

impl Sub for &IntervalMatrix {
    type Output = IntervalMatrix;
    fn sub(self, rhs: &IntervalMatrix) -> IntervalMatrix {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        IntervalMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| *a - *b).collect(),
        }
    }
}

impl Mul for &IntervalMatrix {
    type Output = IntervalMatrix;
    fn mul(self, rhs: &IntervalMatrix) -> IntervalMatrix {
        assert_eq!(self.ncols, rhs.nrows);
        IntervalMatrix::from_fn(self.nrows, rhs.ncols, |i, j| {
            (0..self.ncols).fold(Interval::ZERO, |acc, k| acc + self[(i, k)] * rhs[(k, j)])
        })
    }
}

impl Mul<&IntervalVector> for &IntervalMatrix {
    type Output = IntervalVector;
    fn mul(self, rhs: &IntervalVector) -> IntervalVector {
        self.mul_vec(rhs)
    }
}

impl fmt::Display for IntervalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(")?;
        for i in 0..self.nrows {
            writeln!(f, "  {}", self.row(i))?;
        }
        write!(f, ")")
    }
}

/// Correct an approximate inverse `approx ≈ a⁻¹` into a guaranteed enclosure
/// of `b⁻¹` for every `b ∈ a`.
///
/// With `R = I − approx·a` and `ρ = ‖R‖∞ < 1`, `b⁻¹ = (I − R)⁻¹·approx` and
/// `(I − R)⁻¹ ∈ I + R + E` with `|E_ij| ≤ ρ²/(1−ρ)`. Returns `None` when
/// `ρ ≥ 1` (the approximation is too poor to be certified).
pub fn certify_inverse(a: &IntervalMatrix, approx: &Matrix) -> Option<IntervalMatrix> {
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    assert_eq!((n, n), approx.shape());
    let prod = &IntervalMatrix::from_matrix(approx) * a;
    let r = &IntervalMatrix::identity(n) - &prod;
    let rho = r.norm_inf_ub();
    if !(rho < 1.0) {
        tracing::debug!(rho, "inverse residual too large to certify");
        return None;
    }
    let sigma = Upward::scope(|up| up.div(up.mul(rho, rho), up.one_minus_down(rho)));
    let corr = (&IntervalMatrix::identity(n) + &r).inflate(sigma);
    Some(corr.mul_matrix(approx))
}

/// Guaranteed enclosure of `a⁻¹`, or `None` when `a` is numerically singular.
pub fn inverse_enclosure(a: &Matrix) -> Option<IntervalMatrix> {
    let approx = a.clone().try_inverse()?;
    certify_inverse(&IntervalMatrix::from_matrix(a), &approx)
}

/// Affine parametrization `x ∈ M·(1, t)` of the solution set of `E x = e`.
///
/// `M` has `dim` rows and `fdim + 1` columns: column 0 encloses a particular
/// solution, the remaining columns enclose a kernel basis. Pivot columns are
/// solved through a certified inverse; free columns map to unit vectors, so
/// the kernel part is exact where no pivot is involved.
#[derive(Clone, Debug)]
pub struct EqFlat {
    m: IntervalMatrix,
    /// Rows solved exactly through the certified inverse.
    pivot_rows: Vec<usize>,
    /// Coordinates taken as flat parameters, in column order of `m`.
    free: Vec<usize>,
}

impl EqFlat {
    /// Build the flat of `rows` (each `(a, e)` meaning `a·x = e`).
    ///
    /// Dependent rows whose residual cannot vanish on `bbox` make the system
    /// inconsistent: returns `None`. Dependent rows that remain consistent are
    /// absorbed.
    pub fn build(dim: usize, rows: &[(Vector, f64)], bbox: &IntervalVector) -> Option<EqFlat> {
        let m = rows.len();
        let mut a = Matrix::zeros(m, dim);
        let mut b = Vector::zeros(m);
        for (i, (r, e)) in rows.iter().enumerate() {
            assert_eq!(r.len(), dim);
            a.set_row(i, &r.transpose());
            b[i] = *e;
        }
        let scale = a.iter().fold(1.0_f64, |s, x| s.max(x.abs()));

        // pivoted elimination on a working copy, pivots as (row, col)
        let (mut wa, mut wb) = (a.clone(), b.clone());
        let mut row_used = vec![false; m];
        let mut col_used = vec![false; dim];
        let mut pivots: Vec<(usize, usize)> = Vec::new();
        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..m).filter(|&i| !row_used[i]) {
                for j in (0..dim).filter(|&j| !col_used[j]) {
                    let v = wa[(i, j)].abs();
                    if best.map_or(true, |(_, _, bv)| v > bv) {
                        best = Some((i, j, v));
                    }
                }
            }
            let Some((pi, pj, pv)) = best else { break };
            if pv <= PIVOT_EPS * scale {
                break;
            }
            row_used[pi] = true;
            col_used[pj] = true;
            pivots.push((pi, pj));
            for k in (0..m).filter(|&k| !row_used[k]) {
                let q = wa[(k, pj)] / wa[(pi, pj)];
                if q == 0.0 {
                    continue;
                }
                for j in 0..dim {
                    wa[(k, j)] -= q * wa[(pi, j)];
                }
                wb[k] -= q * wb[pi];
            }
        }
        for k in (0..m).filter(|&k| !row_used[k]) {
            let residual = bbox.dot_row(&wa.row(k).transpose()).inflate(PIVOT_EPS * scale.max(b[k].abs()));
            if !residual.contains(wb[k]) {
                tracing::debug!(row = k, rhs = wb[k], "inconsistent equality system");
                return None;
            }
        }

        let inv = loop {
            if pivots.is_empty() {
                break IntervalMatrix::zeros(0, 0);
            }
            let r = pivots.len();
            let s = Matrix::from_fn(r, r, |i, j| a[(pivots[i].0, pivots[j].1)]);
            if let Some(inv) = inverse_enclosure(&s) {
                break inv;
            }
            // drop the weakest pivot: the flat becomes an outer enclosure
            tracing::warn!(rank = r, "equality basis not certified, dropping a pivot");
            pivots.pop();
        };

        let r = pivots.len();
        let free: Vec<usize> = (0..dim).filter(|j| !pivots.iter().any(|p| p.1 == *j)).collect();
        let fdim = free.len();
        let mut mm = IntervalMatrix::zeros(dim, fdim + 1);
        if r > 0 {
            let bp = Vector::from_iterator(r, pivots.iter().map(|p| b[p.0]));
            let x0 = inv.mul_point(&bp);
            for (k, p) in pivots.iter().enumerate() {
                mm[(p.1, 0)] = x0[k];
            }
        }
        for (l, &f) in free.iter().enumerate() {
            mm[(f, l + 1)] = Interval::ONE;
            if r > 0 {
                let af = Vector::from_iterator(r, pivots.iter().map(|p| a[(p.0, f)]));
                let xk = inv.mul_point(&af);
                for (k, p) in pivots.iter().enumerate() {
                    mm[(p.1, l + 1)] = -xk[k];
                }
            }
        }
        let mut pivot_rows: Vec<usize> = pivots.iter().map(|p| p.0).collect();
        pivot_rows.sort_unstable();
        Some(EqFlat { m: mm, pivot_rows, free })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.m.nrows()
    }

    /// Dimension of the flat.
    #[inline]
    pub fn fdim(&self) -> usize {
        self.m.ncols() - 1
    }

    pub fn matrix(&self) -> &IntervalMatrix {
        &self.m
    }

    /// Indices (into the rows given to `build`) of the equalities every
    /// point of the flat satisfies exactly.
    pub fn pivot_rows(&self) -> &[usize] {
        &self.pivot_rows
    }

    pub fn free_columns(&self) -> &[usize] {
        &self.free
    }

    /// Enclosure of a point of the flat sharing the free coordinates of `x`
    /// (of a direction of the flat when `direction` is set).
    pub fn project(&self, x: &Vector, direction: bool) -> IntervalVector {
        let mut v = IntervalVector::zeros(self.fdim() + 1);
        if !direction {
            v[0] = Interval::ONE;
        }
        for (l, &f) in self.free.iter().enumerate() {
            v[l + 1] = Interval::point(x[f]);
        }
        self.m.mul_vec(&v)
    }

    /// Homogeneous reduced form `(a·M₀ − rhs, a·K)` of the half-space `a·x ≤ rhs`.
    pub fn reduce(&self, row: &Vector, rhs: f64) -> IntervalVector {
        let mut h = self.m.row_mul(row);
        h[0] = h[0] - rhs;
        h
    }

    /// Enclosure of the point with homogeneous flat coordinates `v`
    /// (`v[0] == 0` gives a direction).
    pub fn point(&self, v: &IntervalVector) -> IntervalVector {
        let p = self.m.mul_vec(v);
        if v[0] == Interval::ZERO {
            return p;
        }
        p.iter().map(|x| *x / v[0]).collect()
    }
}
