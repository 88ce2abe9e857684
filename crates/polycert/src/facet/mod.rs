//! Half-space constraints and their canonical ordering.
//!
//! Purpose
//! - `FacetBase` wraps the row of a constraint `row·x ≤ rhs` (or `= rhs`)
//!   together with a sort key derived from its two largest coefficients, so
//!   that a `BTreeMap` keyed by it finds duplicates in O(log n) and groups
//!   the axis-aligned constraints of each coordinate in a contiguous range.
//! - `FacetRhs` carries the bound, the equality flag and the facet id.
//! - `CollectFacets` (see `collect`) is the ordered container.
//!
//! Key layout
//! - Let `A` be the index of the largest `|row[i]|` (first on ties) and `B`
//!   the second largest; `Adim = A` if `row[A] > 0`, `A + n` otherwise
//!   (same for `Bdim`).
//! - `bdim = Adim·(2n+1) − Bdim`, plus `2n` when `Bdim > Adim`; a row with a
//!   single non-zero coefficient gets `bdim = 2n·Adim` (coordinate row); the
//!   null row gets `bdim = −1`.
//! - `vdim = |row[B]| / |row[A]|`, then rows compare lexicographically.
//! - Negating a row moves `bdim` by `±2n²`.

mod collect;
mod relation;

pub use collect::{CollectFacets, DuplicateAction, Insertion, Rekey};
pub use relation::InclRel;
pub(crate) use relation::bwd_dot;

use std::cmp::Ordering;
use std::fmt;

use crate::Vector;

/// Row of a constraint together with its canonical key.
#[derive(Clone, Debug)]
pub struct FacetBase {
    bdim: isize,
    vdim: f64,
    row: Vector,
}

impl FacetBase {
    pub fn new(row: Vector) -> Self {
        // -0.0 and 0.0 must compare equal under total ordering
        let row = row.map(|x| x + 0.0);
        let mut base = FacetBase { bdim: -1, vdim: 0.0, row };
        base.compute_key();
        base
    }

    /// Bounds of the key range holding `±x_i ≤ b` for coordinate `i`.
    pub(crate) fn base_range(dim: usize, i: usize, neg: bool) -> (FacetBase, FacetBase) {
        let d = ((i + if neg { dim } else { 0 }) * 2 * dim) as isize;
        let z = Vector::zeros(dim);
        (
            FacetBase { bdim: d, vdim: -1.0, row: z.clone() },
            FacetBase { bdim: d, vdim: 1.0, row: z },
        )
    }

    fn compute_key(&mut self) {
        let n = self.row.len();
        if n == 0 {
            return;
        }
        let (mut a, mut a_abs): (Option<usize>, f64) = (None, 0.0);
        let (mut b, mut b_abs): (Option<usize>, f64) = (None, 0.0);
        let signed = |i: usize, v: f64| if v < 0.0 { i + n } else { i };
        for (i, &v) in self.row.iter().enumerate() {
            let va = v.abs();
            if va > a_abs {
                b = a;
                b_abs = a_abs;
                a = Some(signed(i, v));
                a_abs = va;
            } else if va > b_abs {
                b = Some(signed(i, v));
                b_abs = va;
            }
        }
        let Some(adim) = a else { return };
        let (adim, n2) = (adim as isize, 2 * n as isize);
        match b {
            None => {
                self.bdim = n2 * adim;
                self.vdim = 0.0;
            }
            Some(bdim) => {
                let bdim = bdim as isize;
                self.bdim = if bdim > adim {
                    adim * (n2 + 1) + n2 - bdim
                } else {
                    adim * (n2 + 1) - bdim
                };
                self.vdim = b_abs / a_abs;
            }
        }
    }

    #[inline]
    pub fn row(&self) -> &Vector {
        &self.row
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.row.len()
    }

    /// All coefficients are zero.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.bdim == -1
    }

    /// Single non-zero coefficient.
    pub fn is_coord(&self) -> bool {
        let n = self.row.len() as isize;
        n > 0 && self.bdim >= 0 && self.bdim % (2 * n) == 0
    }

    /// Index of the largest coefficient in magnitude.
    pub fn gt_dim(&self) -> usize {
        let n = self.row.len() as isize;
        if n == 0 || self.bdim < 0 {
            return 0;
        }
        ((self.bdim / (2 * n)) % n) as usize
    }

    pub(crate) fn negate_row(&mut self) {
        self.row.neg_mut();
        self.row.apply(|x| *x += 0.0);
        let n = self.row.len() as isize;
        let u = 2 * n * n;
        if self.bdim >= u {
            self.bdim -= u;
        } else if self.bdim >= 0 {
            self.bdim += u;
        }
    }

    pub(crate) fn change_row(&mut self, row: Vector) {
        *self = FacetBase::new(row);
    }

    /// `(bdim, vdim)` sort key.
    pub fn key(&self) -> (isize, f64) {
        (self.bdim, self.vdim)
    }
}

impl Ord for FacetBase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bdim
            .cmp(&other.bdim)
            .then_with(|| self.vdim.total_cmp(&other.vdim))
            .then_with(|| {
                self.row
                    .iter()
                    .zip(other.row.iter())
                    .map(|(a, b)| a.total_cmp(b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl PartialOrd for FacetBase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FacetBase {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FacetBase {}

/// Bound, equality flag and id of a facet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FacetRhs {
    pub(crate) rhs: f64,
    pub(crate) eq: bool,
    pub(crate) id: usize,
}

impl FacetRhs {
    pub fn new(rhs: f64, eq: bool) -> Self {
        FacetRhs { rhs, eq, id: 0 }
    }

    #[inline]
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    #[inline]
    pub fn is_eq(&self) -> bool {
        self.eq
    }

    /// Id in the owning collection (`0` when detached).
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Owned constraint `row·x ≤ rhs` (or `= rhs`).
#[derive(Clone, Debug)]
pub struct Facet {
    pub base: FacetBase,
    pub rhs: FacetRhs,
}

impl Facet {
    pub fn new(row: Vector, rhs: f64, eq: bool) -> Self {
        Facet {
            base: FacetBase::new(row),
            rhs: FacetRhs::new(rhs, eq),
        }
    }

    pub fn as_ref(&self) -> FacetRef<'_> {
        FacetRef {
            base: &self.base,
            rhs: &self.rhs,
        }
    }
}

/// Borrowed view of a facet stored in a collection.
#[derive(Clone, Copy, Debug)]
pub struct FacetRef<'a> {
    pub base: &'a FacetBase,
    pub rhs: &'a FacetRhs,
}

impl<'a> FacetRef<'a> {
    #[inline]
    pub fn row(&self) -> &'a Vector {
        &self.base.row
    }

    #[inline]
    pub fn rhs(&self) -> f64 {
        self.rhs.rhs
    }

    #[inline]
    pub fn is_eq(&self) -> bool {
        self.rhs.eq
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.rhs.id
    }

    pub fn to_owned(&self) -> Facet {
        Facet {
            base: self.base.clone(),
            rhs: *self.rhs,
        }
    }
}

impl fmt::Display for FacetRef<'_> {
    /// Row normalised by its largest coefficient.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = if self.base.is_null() {
            1.0
        } else {
            self.row()[self.base.gt_dim()].abs()
        };
        write!(f, "{} : (", self.id())?;
        for (i, x) in self.row().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", x / scale)?;
        }
        let op = if self.is_eq() { "=" } else { "<=" };
        write!(f, ") {op} {}", self.rhs() / scale)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

#[cfg(test)]
mod tests;
