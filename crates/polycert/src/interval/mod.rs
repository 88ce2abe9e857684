//! Interval arithmetic: scalars, vectors, matrices and guaranteed inverses.
//!
//! Purpose
//! - Provide the outward-rounded enclosures the certified layers rely on:
//!   `Interval`, `IntervalVector`, `IntervalMatrix`, plus `BoolInterval` for
//!   three-valued answers.
//! - `inverse_enclosure` turns an approximate floating-point inverse into a
//!   guaranteed one (Neumann residual bound); `EqFlat` parametrizes the
//!   solution set of an equality system with a guaranteed kernel.
//!
//! Conventions
//! - An empty interval has `lo = +∞`, `hi = −∞`; every operation with an
//!   empty operand is empty.
//! - Rounding is outward and only applied when the float operation was
//!   inexact (see `round`).

mod matrix;
mod round;
mod vector;

pub use matrix::{certify_inverse, inverse_enclosure, EqFlat, IntervalMatrix};
pub use round::Upward;
pub use vector::IntervalVector;

pub(crate) use round::{add_down, add_up, div_down, div_up, mul_down, mul_up, sqrt_up, sub_down, sub_up};

use std::fmt;
use std::ops::{Add, AddAssign, BitAnd, BitAndAssign, BitOr, BitOrAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Closed interval `[lo, hi]` of reals, possibly unbounded or empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    pub const EMPTY: Interval = Interval {
        lo: f64::INFINITY,
        hi: f64::NEG_INFINITY,
    };
    pub const ENTIRE: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };
    pub const ZERO: Interval = Interval { lo: 0.0, hi: 0.0 };
    pub const ONE: Interval = Interval { lo: 1.0, hi: 1.0 };

    /// `[lo, hi]`; empty when `lo > hi` or either bound is NaN.
    #[inline]
    pub fn new(lo: f64, hi: f64) -> Self {
        if lo.is_nan() || hi.is_nan() || lo > hi || lo == f64::INFINITY || hi == f64::NEG_INFINITY {
            Self::EMPTY
        } else {
            // normalise -0.0 so that degenerate zeros compare equal
            Self { lo: lo + 0.0, hi: hi + 0.0 }
        }
    }

    #[inline]
    pub fn point(x: f64) -> Self {
        Self::new(x, x)
    }

    /// `[-r, r]`.
    #[inline]
    pub fn pm(r: f64) -> Self {
        Self::new(-r, r)
    }

    #[inline]
    pub fn lb(&self) -> f64 {
        self.lo
    }

    #[inline]
    pub fn ub(&self) -> f64 {
        self.hi
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Empty or a single point.
    #[inline]
    pub fn is_degenerated(&self) -> bool {
        self.is_empty() || self.lo == self.hi
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        !self.is_empty() && (self.lo == f64::NEG_INFINITY || self.hi == f64::INFINITY)
    }

    /// Can be split into two non-degenerate halves.
    pub fn is_bisectable(&self) -> bool {
        if self.is_degenerated() {
            return false;
        }
        let m = self.mid();
        self.lo < m && m < self.hi
    }

    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }

    #[inline]
    pub fn interior_contains(&self, x: f64) -> bool {
        self.lo < x && x < self.hi
    }

    #[inline]
    pub fn is_subset(&self, other: &Interval) -> bool {
        self.is_empty() || (other.lo <= self.lo && self.hi <= other.hi)
    }

    #[inline]
    pub fn intersects(&self, other: &Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.lo <= other.hi && other.lo <= self.hi
    }

    #[inline]
    pub fn is_disjoint(&self, other: &Interval) -> bool {
        !self.intersects(other)
    }

    /// Midpoint; finite for every non-empty interval.
    pub fn mid(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        match (self.lo.is_finite(), self.hi.is_finite()) {
            (false, false) => 0.0,
            (false, true) => f64::MIN,
            (true, false) => f64::MAX,
            (true, true) => {
                let m = 0.5 * self.lo + 0.5 * self.hi;
                m.clamp(self.lo, self.hi)
            }
        }
    }

    /// Upper bound of the radius.
    pub fn rad(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        let m = self.mid();
        sub_up(self.hi, m).max(sub_up(m, self.lo))
    }

    /// Upper bound of the width.
    pub fn diam(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        sub_up(self.hi, self.lo)
    }

    /// Largest absolute value.
    #[inline]
    pub fn mag(&self) -> f64 {
        self.lo.abs().max(self.hi.abs())
    }

    /// Smallest absolute value.
    #[inline]
    pub fn mig(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if self.contains(0.0) {
            0.0
        } else {
            self.lo.abs().min(self.hi.abs())
        }
    }

    /// `[lo - r, hi + r]`.
    pub fn inflate(&self, r: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(sub_down(self.lo, r), add_up(self.hi, r))
    }

    pub fn hull(&self, other: &Interval) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn intersection(&self, other: &Interval) -> Self {
        Self::new(self.lo.max(other.lo), self.hi.min(other.hi))
    }

    pub fn abs(&self) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(self.mig(), self.mag())
    }

    pub fn sqr(&self) -> Self {
        if self.is_empty() {
            return *self;
        }
        let a = self.abs();
        Self::new(mul_down(a.lo, a.lo), mul_up(a.hi, a.hi))
    }

    pub fn sqrt(&self) -> Self {
        let x = self.intersection(&Self::new(0.0, f64::INFINITY));
        if x.is_empty() {
            return x;
        }
        Self::new(round::sqrt_down(x.lo), sqrt_up(x.hi))
    }

    pub fn max(&self, other: &Interval) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        Self::new(self.lo.max(other.lo), self.hi.max(other.hi))
    }

    pub fn min(&self, other: &Interval) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        Self::new(self.lo.min(other.lo), self.hi.min(other.hi))
    }

    /// Split at the midpoint into `[lo, mid]` and `[mid, hi]`.
    pub fn bisect(&self) -> (Self, Self) {
        let m = self.mid();
        (Self::new(self.lo, m), Self::new(m, self.hi))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::ENTIRE
    }
}

impl From<f64> for Interval {
    fn from(x: f64) -> Self {
        Self::point(x)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[ empty ]")
        } else if self.lo == self.hi {
            write!(f, "[{}]", self.lo)
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

impl Neg for Interval {
    type Output = Interval;
    fn neg(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        Interval::new(-self.hi, -self.lo)
    }
}

impl Add for Interval {
    type Output = Interval;
    fn add(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(add_down(self.lo, rhs.lo), add_up(self.hi, rhs.hi))
    }
}

impl Sub for Interval {
    type Output = Interval;
    fn sub(self, rhs: Interval) -> Interval {
        self + (-rhs)
    }
}

impl Mul for Interval {
    type Output = Interval;
    fn mul(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        let (a, b) = (self, rhs);
        let lo = mul_down(a.lo, b.lo)
            .min(mul_down(a.lo, b.hi))
            .min(mul_down(a.hi, b.lo))
            .min(mul_down(a.hi, b.hi));
        let hi = mul_up(a.lo, b.lo)
            .max(mul_up(a.lo, b.hi))
            .max(mul_up(a.hi, b.lo))
            .max(mul_up(a.hi, b.hi));
        Interval::new(lo, hi)
    }
}

impl Div for Interval {
    type Output = Interval;
    fn div(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        let (a, b) = (self, rhs);
        if b.lo == 0.0 && b.hi == 0.0 {
            return Interval::EMPTY;
        }
        if b.contains(0.0) {
            if a.contains(0.0) || b.interior_contains(0.0) {
                return Interval::ENTIRE;
            }
            // b = [0, hi] or [lo, 0]
            return match (a.lo > 0.0, b.lo == 0.0) {
                (true, true) => Interval::new(div_down(a.lo, b.hi), f64::INFINITY),
                (true, false) => Interval::new(f64::NEG_INFINITY, div_up(a.lo, b.lo)),
                (false, true) => Interval::new(f64::NEG_INFINITY, div_up(a.hi, b.hi)),
                (false, false) => Interval::new(div_down(a.hi, b.lo), f64::INFINITY),
            };
        }
        let lo = div_down(a.lo, b.lo)
            .min(div_down(a.lo, b.hi))
            .min(div_down(a.hi, b.lo))
            .min(div_down(a.hi, b.hi));
        let hi = div_up(a.lo, b.lo)
            .max(div_up(a.lo, b.hi))
            .max(div_up(a.hi, b.lo))
            .max(div_up(a.hi, b.hi));
        Interval::new(lo, hi)
    }
}

macro_rules! scalar_ops {
    ($($tr:ident $f:ident),*) => {$(
        impl $tr<f64> for Interval {
            type Output = Interval;
            #[inline]
            fn $f(self, rhs: f64) -> Interval {
                $tr::$f(self, Interval::point(rhs))
            }
        }
        impl $tr<Interval> for f64 {
            type Output = Interval;
            #[inline]
            fn $f(self, rhs: Interval) -> Interval {
                $tr::$f(Interval::point(self), rhs)
            }
        }
    )*};
}
scalar_ops!(Add add, Sub sub, Mul mul, Div div);

impl<T: Into<Interval>> AddAssign<T> for Interval {
    fn add_assign(&mut self, rhs: T) {
        *self = *self + rhs.into();
    }
}

impl<T: Into<Interval>> SubAssign<T> for Interval {
    fn sub_assign(&mut self, rhs: T) {
        *self = *self - rhs.into();
    }
}

impl<T: Into<Interval>> MulAssign<T> for Interval {
    fn mul_assign(&mut self, rhs: T) {
        *self = *self * rhs.into();
    }
}

impl BitAnd for Interval {
    type Output = Interval;
    fn bitand(self, rhs: Interval) -> Interval {
        self.intersection(&rhs)
    }
}

impl BitOr for Interval {
    type Output = Interval;
    fn bitor(self, rhs: Interval) -> Interval {
        self.hull(&rhs)
    }
}

impl BitAndAssign for Interval {
    fn bitand_assign(&mut self, rhs: Interval) {
        *self = self.intersection(&rhs);
    }
}

impl BitOrAssign for Interval {
    fn bitor_assign(&mut self, rhs: Interval) {
        *self = self.hull(&rhs);
    }
}

/// Three-valued boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoolInterval {
    True,
    False,
    Unknown,
}

impl BoolInterval {
    #[inline]
    pub fn is_true(self) -> bool {
        self == BoolInterval::True
    }

    #[inline]
    pub fn is_false(self) -> bool {
        self == BoolInterval::False
    }

    /// Three-valued conjunction.
    pub fn and(self, other: BoolInterval) -> BoolInterval {
        use BoolInterval::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Unknown,
        }
    }

    /// Three-valued disjunction.
    pub fn or(self, other: BoolInterval) -> BoolInterval {
        use BoolInterval::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, False) => False,
            _ => Unknown,
        }
    }
}

impl From<bool> for BoolInterval {
    fn from(b: bool) -> Self {
        if b {
            BoolInterval::True
        } else {
            BoolInterval::False
        }
    }
}

impl Neg for BoolInterval {
    type Output = BoolInterval;
    fn neg(self) -> BoolInterval {
        match self {
            BoolInterval::True => BoolInterval::False,
            BoolInterval::False => BoolInterval::True,
            BoolInterval::Unknown => BoolInterval::Unknown,
        }
    }
}

impl fmt::Display for BoolInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoolInterval::True => "TRUE",
            BoolInterval::False => "FALSE",
            BoolInterval::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
