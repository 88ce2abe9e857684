//! Directed rounding without touching the floating-point environment.
//!
//! Each primitive evaluates the round-to-nearest result, recovers the exact
//! rounding error with an error-free transformation (TwoSum / FMA residual)
//! and steps one ulp in the requested direction only when the operation was
//! inexact. Exact results (e.g. `0.5 + 0.25`) therefore stay exact, which keeps
//! degenerate intervals degenerate.
//!
//! `Upward::scope` packages the upward primitives as an explicit scoped
//! context for blocks that must be evaluated "in round-toward-+∞ mode"
//! (norm bounds of residual matrices, Neumann tails).

/// Below this magnitude an FMA residual may itself underflow; widen blindly.
const TINY: f64 = f64::MIN_POSITIVE * 9007199254740992.0; // 2^-1022 * 2^53

#[inline]
fn two_sum_err(a: f64, b: f64, s: f64) -> f64 {
    let bb = s - a;
    (a - (s - bb)) + (b - bb)
}

/// Overflowed a finite operation: clamp toward the finite range if rounding allows it.
#[inline]
fn overflow_up(s: f64) -> f64 {
    if s == f64::NEG_INFINITY {
        f64::MIN
    } else {
        s
    }
}

#[inline]
fn overflow_down(s: f64) -> f64 {
    if s == f64::INFINITY {
        f64::MAX
    } else {
        s
    }
}

#[inline]
pub(crate) fn add_up(a: f64, b: f64) -> f64 {
    let s = a + b;
    if !s.is_finite() {
        return if a.is_finite() && b.is_finite() { overflow_up(s) } else { s };
    }
    if s.abs() < TINY {
        return if two_sum_err(a, b, s) == 0.0 { s } else { s.next_up() };
    }
    if two_sum_err(a, b, s) > 0.0 {
        s.next_up()
    } else {
        s
    }
}

#[inline]
pub(crate) fn add_down(a: f64, b: f64) -> f64 {
    let s = a + b;
    if !s.is_finite() {
        return if a.is_finite() && b.is_finite() { overflow_down(s) } else { s };
    }
    if s.abs() < TINY {
        return if two_sum_err(a, b, s) == 0.0 { s } else { s.next_down() };
    }
    if two_sum_err(a, b, s) < 0.0 {
        s.next_down()
    } else {
        s
    }
}

#[inline]
pub(crate) fn sub_up(a: f64, b: f64) -> f64 {
    add_up(a, -b)
}

#[inline]
pub(crate) fn sub_down(a: f64, b: f64) -> f64 {
    add_down(a, -b)
}

/// `0 * ±∞` is `0` for interval endpoints.
#[inline]
pub(crate) fn mul_up(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    let p = a * b;
    if !p.is_finite() {
        return if a.is_finite() && b.is_finite() { overflow_up(p) } else { p };
    }
    if p.abs() < TINY {
        return p.next_up();
    }
    let e = a.mul_add(b, -p);
    if e > 0.0 {
        p.next_up()
    } else {
        p
    }
}

#[inline]
pub(crate) fn mul_down(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    let p = a * b;
    if !p.is_finite() {
        return if a.is_finite() && b.is_finite() { overflow_down(p) } else { p };
    }
    if p.abs() < TINY {
        return p.next_down();
    }
    let e = a.mul_add(b, -p);
    if e < 0.0 {
        p.next_down()
    } else {
        p
    }
}

/// Sign of the residual `a - q*b` divided by `b`, i.e. on which side of `q` the
/// exact quotient lies.
#[inline]
fn div_side(a: f64, b: f64, q: f64) -> f64 {
    let r = (-q).mul_add(b, a);
    if r == 0.0 {
        0.0
    } else if (r > 0.0) == (b > 0.0) {
        1.0
    } else {
        -1.0
    }
}

#[inline]
pub(crate) fn div_up(a: f64, b: f64) -> f64 {
    let q = a / b;
    if q.is_nan() {
        return f64::INFINITY;
    }
    if !q.is_finite() {
        return if a.is_finite() && b != 0.0 { overflow_up(q) } else { q };
    }
    if !a.is_finite() || !b.is_finite() {
        return q;
    }
    if q.abs() < TINY {
        return if q == 0.0 && a == 0.0 { 0.0 } else { q.next_up() };
    }
    if div_side(a, b, q) > 0.0 {
        q.next_up()
    } else {
        q
    }
}

#[inline]
pub(crate) fn div_down(a: f64, b: f64) -> f64 {
    let q = a / b;
    if q.is_nan() {
        return f64::NEG_INFINITY;
    }
    if !q.is_finite() {
        return if a.is_finite() && b != 0.0 { overflow_down(q) } else { q };
    }
    if !a.is_finite() || !b.is_finite() {
        return q;
    }
    if q.abs() < TINY {
        return if q == 0.0 && a == 0.0 { 0.0 } else { q.next_down() };
    }
    if div_side(a, b, q) < 0.0 {
        q.next_down()
    } else {
        q
    }
}

#[inline]
pub(crate) fn sqrt_up(a: f64) -> f64 {
    let s = a.sqrt();
    if !s.is_finite() || s == 0.0 {
        return s;
    }
    let r = (-s).mul_add(s, a);
    if r > 0.0 {
        s.next_up()
    } else {
        s
    }
}

#[inline]
pub(crate) fn sqrt_down(a: f64) -> f64 {
    let s = a.sqrt();
    if !s.is_finite() || s == 0.0 {
        return s;
    }
    let r = (-s).mul_add(s, a);
    if r < 0.0 {
        s.next_down()
    } else {
        s
    }
}

/// Scoped upward-rounding context.
///
/// ```
/// use polycert::interval::Upward;
/// let n = Upward::scope(|up| up.norm2(&[3.0, 4.0]));
/// assert!(n >= 5.0);
/// ```
pub struct Upward {
    _scope: (),
}

impl Upward {
    /// Evaluate `f` with an upward-rounding context.
    #[inline]
    pub fn scope<R>(f: impl FnOnce(&Upward) -> R) -> R {
        f(&Upward { _scope: () })
    }

    #[inline]
    pub fn add(&self, a: f64, b: f64) -> f64 {
        add_up(a, b)
    }
    #[inline]
    pub fn sub(&self, a: f64, b: f64) -> f64 {
        sub_up(a, b)
    }
    #[inline]
    pub fn mul(&self, a: f64, b: f64) -> f64 {
        mul_up(a, b)
    }
    #[inline]
    pub fn div(&self, a: f64, b: f64) -> f64 {
        div_up(a, b)
    }
    #[inline]
    pub fn sqrt(&self, a: f64) -> f64 {
        sqrt_up(a)
    }

    /// Upper bound of `Σ xs`.
    pub fn sum(&self, xs: impl IntoIterator<Item = f64>) -> f64 {
        xs.into_iter().fold(0.0, add_up)
    }

    /// Upper bound of `a·b`.
    pub fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).fold(0.0, |acc, (&x, &y)| add_up(acc, mul_up(x, y)))
    }

    /// Upper bound of the euclidean norm.
    pub fn norm2(&self, a: &[f64]) -> f64 {
        sqrt_up(a.iter().fold(0.0, |acc, &x| add_up(acc, mul_up(x, x))))
    }

    /// Upper bound of `1 - x` rounded down, i.e. a lower bound of `1 - x`.
    #[inline]
    pub fn one_minus_down(&self, x: f64) -> f64 {
        -sub_up(x, 1.0)
    }
}
