//! Boxes: vectors of intervals.

use std::fmt;
use std::ops::{Add, BitAnd, BitAndAssign, BitOr, BitOrAssign, Deref, DerefMut, Mul, Neg, Sub};

use super::{add_up, mul_up, Interval};
use crate::Vector;

/// Axis-aligned box, also used as an interval-valued row.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct IntervalVector(Vec<Interval>);

impl IntervalVector {
    /// `n` copies of `x`.
    pub fn constant(n: usize, x: Interval) -> Self {
        Self(vec![x; n])
    }

    /// Unbounded box of dimension `n`.
    pub fn entire(n: usize) -> Self {
        Self::constant(n, Interval::ENTIRE)
    }

    pub fn zeros(n: usize) -> Self {
        Self::constant(n, Interval::ZERO)
    }

    pub fn empty(n: usize) -> Self {
        Self::constant(n, Interval::EMPTY)
    }

    pub fn from_point(v: &Vector) -> Self {
        Self(v.iter().map(|&x| Interval::point(x)).collect())
    }

    /// Box `[lo_i, hi_i]` from bound slices.
    pub fn from_bounds(lo: &[f64], hi: &[f64]) -> Self {
        assert_eq!(lo.len(), hi.len());
        Self(lo.iter().zip(hi).map(|(&l, &h)| Interval::new(l, h)).collect())
    }

    /// Box `[-r, r]^n` around `c`.
    pub fn around(c: &Vector, r: f64) -> Self {
        Self(c.iter().map(|&x| Interval::point(x).inflate(r)).collect())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> Vec<Interval> {
        self.0
    }

    /// Any component empty.
    pub fn is_empty(&self) -> bool {
        self.0.iter().any(Interval::is_empty)
    }

    pub fn set_empty(&mut self) {
        self.0.iter_mut().for_each(|x| *x = Interval::EMPTY);
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.iter().any(Interval::is_unbounded)
    }

    /// Every component degenerated (a point), or empty.
    pub fn is_degenerated(&self) -> bool {
        self.is_empty() || self.0.iter().all(Interval::is_degenerated)
    }

    /// Some component can be split.
    pub fn is_bisectable(&self) -> bool {
        self.0.iter().any(Interval::is_bisectable)
    }

    /// Number of degenerated components.
    pub fn nb_degenerated(&self) -> usize {
        self.0.iter().filter(|x| x.is_degenerated()).count()
    }

    pub fn is_subset(&self, other: &IntervalVector) -> bool {
        debug_assert_eq!(self.size(), other.size());
        self.is_empty() || self.0.iter().zip(&other.0).all(|(a, b)| a.is_subset(b))
    }

    pub fn intersects(&self, other: &IntervalVector) -> bool {
        debug_assert_eq!(self.size(), other.size());
        self.0.iter().zip(&other.0).all(|(a, b)| a.intersects(b))
    }

    pub fn is_disjoint(&self, other: &IntervalVector) -> bool {
        !self.intersects(other)
    }

    pub fn contains(&self, p: &Vector) -> bool {
        self.0.iter().zip(p.iter()).all(|(a, &x)| a.contains(x))
    }

    pub fn mid(&self) -> Vector {
        Vector::from_iterator(self.size(), self.0.iter().map(Interval::mid))
    }

    pub fn lb(&self) -> Vector {
        Vector::from_iterator(self.size(), self.0.iter().map(Interval::lb))
    }

    pub fn ub(&self) -> Vector {
        Vector::from_iterator(self.size(), self.0.iter().map(Interval::ub))
    }

    /// Upper bound of the radius of each component.
    pub fn rad(&self) -> Vector {
        Vector::from_iterator(self.size(), self.0.iter().map(Interval::rad))
    }

    pub fn max_diam(&self) -> f64 {
        self.0.iter().map(Interval::diam).fold(0.0, f64::max)
    }

    pub fn inflate(&self, r: f64) -> Self {
        Self(self.0.iter().map(|x| x.inflate(r)).collect())
    }

    /// Componentwise inflation by `r_i`.
    pub fn inflate_box(&self, r: &IntervalVector) -> Self {
        Self(self.0.iter().zip(&r.0).map(|(x, ri)| *x + *ri).collect())
    }

    pub fn hull(&self, other: &IntervalVector) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a.hull(b)).collect())
    }

    pub fn intersection(&self, other: &IntervalVector) -> Self {
        let mut out = Self(self.0.iter().zip(&other.0).map(|(a, b)| a.intersection(b)).collect());
        if out.is_empty() {
            out.set_empty();
        }
        out
    }

    /// Enclosure of `row · self`.
    pub fn dot_row(&self, row: &Vector) -> Interval {
        debug_assert_eq!(row.len(), self.size());
        row.iter()
            .zip(&self.0)
            .filter(|(r, _)| **r != 0.0)
            .fold(Interval::ZERO, |acc, (&r, x)| acc + *x * r)
    }

    /// Enclosure of `self · other`.
    pub fn dot(&self, other: &IntervalVector) -> Interval {
        debug_assert_eq!(other.size(), self.size());
        self.0.iter().zip(&other.0).fold(Interval::ZERO, |acc, (a, b)| acc + *a * *b)
    }

    /// Upper bound of `row · x` over the box.
    pub fn max_row(&self, row: &Vector) -> f64 {
        self.dot_row(row).ub()
    }

    /// Upper bound of the euclidean norm of any point of the box.
    pub fn norm2_ub(&self) -> f64 {
        let s = self.0.iter().fold(0.0, |acc, x| add_up(acc, mul_up(x.mag(), x.mag())));
        super::sqrt_up(s)
    }

    /// Corner of the box maximizing `row · x` (lower bound where the
    /// coefficient is negative).
    pub fn corner_max(&self, row: &Vector) -> Vector {
        Vector::from_iterator(
            self.size(),
            self.0.iter().zip(row.iter()).map(|(x, &r)| if r >= 0.0 { x.ub() } else { x.lb() }),
        )
    }

    /// Corner of the box minimizing `row · x`.
    pub fn corner_min(&self, row: &Vector) -> Vector {
        Vector::from_iterator(
            self.size(),
            self.0.iter().zip(row.iter()).map(|(x, &r)| if r >= 0.0 { x.lb() } else { x.ub() }),
        )
    }
}

impl From<Vec<Interval>> for IntervalVector {
    fn from(v: Vec<Interval>) -> Self {
        Self(v)
    }
}

impl From<&Vector> for IntervalVector {
    fn from(v: &Vector) -> Self {
        Self::from_point(v)
    }
}

impl FromIterator<Interval> for IntervalVector {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for IntervalVector {
    type Target = [Interval];
    fn deref(&self) -> &[Interval] {
        &self.0
    }
}

impl DerefMut for IntervalVector {
    fn deref_mut(&mut self) -> &mut [Interval] {
        &mut self.0
    }
}

impl Neg for &IntervalVector {
    type Output = IntervalVector;
    fn neg(self) -> IntervalVector {
        self.0.iter().map(|x| -*x).collect()
    }
}

impl Add for &IntervalVector {
    type Output = IntervalVector;
    fn add(self, rhs: &IntervalVector) -> IntervalVector {
        debug_assert_eq!(self.size(), rhs.size());
        self.0.iter().zip(&rhs.0).map(|(a, b)| *a + *b).collect()
    }
}

impl Sub for &IntervalVector {
    type Output = IntervalVector;
    fn sub(self, rhs: &IntervalVector) -> IntervalVector {
        debug_assert_eq!(self.size(), rhs.size());
        self.0.iter().zip(&rhs.0).map(|(a, b)| *a - *b).collect()
    }
}

impl Add<&Vector> for &IntervalVector {
    type Output = IntervalVector;
    fn add(self, rhs: &Vector) -> IntervalVector {
        self.0.iter().zip(rhs.iter()).map(|(a, &b)| *a + b).collect()
    }
}

impl Mul<Interval> for &IntervalVector {
    type Output = IntervalVector;
    fn mul(self, rhs: Interval) -> IntervalVector {
        self.0.iter().map(|a| *a * rhs).collect()
    }
}

impl BitAnd for &IntervalVector {
    type Output = IntervalVector;
    fn bitand(self, rhs: &IntervalVector) -> IntervalVector {
        self.intersection(rhs)
    }
}

impl BitOr for &IntervalVector {
    type Output = IntervalVector;
    fn bitor(self, rhs: &IntervalVector) -> IntervalVector {
        self.hull(rhs)
    }
}

impl BitAndAssign<&IntervalVector> for IntervalVector {
    fn bitand_assign(&mut self, rhs: &IntervalVector) {
        *self = self.intersection(rhs);
    }
}

impl BitOrAssign<&IntervalVector> for IntervalVector {
    fn bitor_assign(&mut self, rhs: &IntervalVector) {
        *self = self.hull(rhs);
    }
}

impl fmt::Display for IntervalVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ; ")?;
            }
            write!(f, "{x}")?;
        }
        write!(f, ")")
    }
}
