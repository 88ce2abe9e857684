//! Relations between a single facet and a box.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::FacetRef;
use crate::interval::{Interval, IntervalVector};
use crate::Vector;

/// Inclusion / intersection relation between a box and a facet half-space,
/// as a set of flags. `INCLUDES` means the half-space includes the box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InclRel(u8);

impl InclRel {
    pub const INCLUDES: InclRel = InclRel(1);
    pub const MAYINCLUDE: InclRel = InclRel(1 << 1);
    pub const NOTINCLUDE: InclRel = InclRel(1 << 2);
    pub const INTERSECTS: InclRel = InclRel(1 << 3);
    pub const MAYINTERSECT: InclRel = InclRel(1 << 4);
    pub const DISJOINT: InclRel = InclRel(1 << 5);

    #[inline]
    pub fn contains(self, other: InclRel) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for InclRel {
    type Output = InclRel;
    fn bitor(self, rhs: InclRel) -> InclRel {
        InclRel(self.0 | rhs.0)
    }
}

impl BitOrAssign for InclRel {
    fn bitor_assign(&mut self, rhs: InclRel) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for InclRel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 6] = ["INCLUDES", "MAYINCLUDE", "NOTINCLUDE", "INTERSECTS", "MAYINTERSECT", "DISJOINT"];
        let mut first = true;
        for (i, name) in NAMES.iter().enumerate() {
            if self.0 & (1 << i) != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Backward contraction of `b` with respect to `row·x ∈ y`.
pub(crate) fn bwd_dot(row: &IntervalVector, y: Interval, b: &mut IntervalVector) {
    let y = y & row.dot(b);
    if y.is_empty() {
        b.set_empty();
        return;
    }
    for i in (0..row.size()).filter(|&i| row[i] != Interval::ZERO) {
        let rest = (0..row.size())
            .filter(|&j| j != i && row[j] != Interval::ZERO)
            .fold(Interval::ZERO, |acc, j| acc + b[j] * row[j]);
        b[i] &= (y - rest) / row[i];
        if b[i].is_empty() {
            b.set_empty();
            return;
        }
    }
}

impl FacetRef<'_> {
    /// Relation of the half-space (or hyperplane) with the box `b`.
    /// With `strict`, the open half-space `row·x < rhs` is used; an equality
    /// then never includes anything.
    pub fn relation_box(&self, b: &IntervalVector, strict: bool) -> InclRel {
        let row = self.row();
        let rhs = self.rhs();
        let eq = self.is_eq();
        if eq && strict {
            return InclRel::NOTINCLUDE | InclRel::DISJOINT;
        }
        if b.is_empty() {
            return InclRel::INCLUDES | InclRel::DISJOINT;
        }
        let maxv = IntervalVector::from_point(&b.corner_max(row)).dot_row(row) - rhs;
        let mut r1;
        if maxv.ub() <= 0.0 && (!strict || maxv.ub() < 0.0) {
            if !eq {
                return InclRel::INCLUDES | InclRel::INTERSECTS;
            } else if maxv.ub() < 0.0 {
                return InclRel::NOTINCLUDE | InclRel::DISJOINT;
            }
            r1 = InclRel::INCLUDES;
        } else if maxv.lb() <= 0.0 && (!strict || maxv.lb() < 0.0) {
            r1 = InclRel::MAYINCLUDE;
        } else {
            r1 = InclRel::NOTINCLUDE;
        }
        let minv = IntervalVector::from_point(&b.corner_min(row)).dot_row(row) - rhs;
        if minv.lb() > 0.0 || (strict && minv.lb() >= 0.0) {
            return InclRel::NOTINCLUDE | InclRel::DISJOINT;
        }
        if !eq {
            if minv.ub() > 0.0 || (strict && minv.ub() >= 0.0) {
                return r1 | InclRel::MAYINTERSECT;
            }
            return r1 | InclRel::INTERSECTS;
        }
        if r1 == InclRel::INCLUDES {
            if minv.lb() >= 0.0 {
                return InclRel::INCLUDES | InclRel::INTERSECTS;
            }
            let inter = if maxv.lb() == 0.0 { InclRel::INTERSECTS } else { InclRel::MAYINTERSECT };
            let incl = if minv.ub() < 0.0 { InclRel::NOTINCLUDE } else { InclRel::MAYINCLUDE };
            return inter | incl;
        }
        if minv.ub() < 0.0 {
            r1 = InclRel::NOTINCLUDE;
        }
        if maxv.lb() >= 0.0 && minv.ub() <= 0.0 {
            r1 | InclRel::INTERSECTS
        } else {
            r1 | InclRel::MAYINTERSECT
        }
    }

    /// Contract `b` to its intersection with the facet.
    pub fn contract_box(&self, b: &mut IntervalVector) {
        let y = if self.is_eq() {
            Interval::point(self.rhs())
        } else {
            Interval::new(f64::NEG_INFINITY, self.rhs())
        };
        bwd_dot(&IntervalVector::from_point(self.row()), y, b);
    }

    /// Contract `b` to its intersection with the complement of the facet
    /// (closure of `row·x > rhs`).
    pub fn contract_out_box(&self, b: &mut IntervalVector) {
        let row = self.row();
        let rhs = self.rhs();
        if self.base.is_coord() {
            let c = self.base.gt_dim();
            let val = Interval::point(rhs) / row[c];
            if self.is_eq() {
                if val.is_degenerated() && val == b[c] {
                    b.set_empty();
                }
            } else if row[c] > 0.0 {
                // x_c ≥ val
                if b[c].ub() <= val.lb() {
                    b.set_empty();
                } else if b[c].lb() <= val.lb() {
                    b[c] = Interval::new(val.lb(), b[c].ub());
                }
            } else if b[c].lb() >= val.ub() {
                b.set_empty();
            } else if b[c].ub() >= val.ub() {
                b[c] = Interval::new(b[c].lb(), val.ub());
            }
            return;
        }
        let a = b.dot_row(row);
        if a.ub() <= rhs {
            b.set_empty();
            return;
        }
        if self.is_eq() {
            if a.lb() >= rhs {
                b.set_empty();
            }
            return;
        }
        bwd_dot(&IntervalVector::from_point(row), Interval::new(rhs, f64::INFINITY), b);
    }

    /// Upper bound of `row2·x` over the facet intersected with `b`, using
    /// the dominant coordinate of the facet:
    /// `q·rhs + (row2 − q·row)·b` with `q = row2[g]/row[g]`.
    /// Returns `ENTIRE` when `q` would be negative on an inequality.
    pub fn bound_linear_form(&self, row2: &Vector, b: &IntervalVector) -> Interval {
        if self.base.is_null() {
            return Interval::ENTIRE;
        }
        let row = self.row();
        let g = self.base.gt_dim();
        let neg = row[g] < 0.0;
        if !self.is_eq() && ((!neg && row2[g] <= 0.0) || (neg && row2[g] >= 0.0)) {
            return Interval::ENTIRE;
        }
        let q = Interval::point(row2[g]) / row[g];
        let res = q * self.rhs();
        let rem = (0..row.len())
            .filter(|&i| i != g)
            .fold(Interval::ZERO, |acc, i| acc + (row2[i] - q * row[i]) * b[i]);
        res + rem
    }
}
