//! Double description: incremental conversion between facets and vertices.
//!
//! Purpose
//! - `DdBuildF2V` keeps the vertices, rays and lines of the polyhedron cut
//!   so far, one facet at a time.
//! - `DdBuildV2F` keeps the facets of the hull of the vertices seen so far,
//!   one vertex at a time.
//!
//! Representation
//! - Nodes live in a `Vec` arena; adjacency links are slot indices into the
//!   same arena. Removed nodes are marked during an insertion and compacted
//!   at its end, with every surviving link remapped.
//! - Incidence lists (`fcts` for vertices, `vtx` for facets) are sorted and
//!   deduplicated; adjacency between two new nodes is decided by comparing
//!   the common part of their incidences (`PairMaxSets`).

mod f2v;
mod v2f;

pub use f2v::{DdBuildF2V, DdVertex, FacetCode};
pub use v2f::{DdBuildV2F, DdFacet};

use crate::cfg::REDUCE_EXP;
use crate::interval::IntervalVector;
use crate::Vector;

/// Life cycle of a node during one insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeStatus {
    /// Created during the current insertion.
    New,
    /// Strictly inside the new constraint.
    In,
    /// On the boundary, within tolerance.
    On,
    /// Outside but kept (already reached from the boundary).
    Ge,
    /// Strictly outside, not yet processed.
    Gt,
    /// Outside, queued for processing.
    Stack,
    /// To be erased at the end of the insertion.
    Rem,
}

/// Pair of nodes and the common part of their incidence lists.
#[derive(Clone, Debug)]
pub struct PairMaxSets<T> {
    pub a: T,
    pub b: T,
    pub elems: Vec<usize>,
}

impl<T: Copy> PairMaxSets<T> {
    /// Pair `(a, b)` with the sorted intersection of `e1` and `e2`,
    /// skipping `reject`.
    pub fn new(a: T, b: T, e1: &[usize], e2: &[usize], reject: Option<usize>) -> Self {
        let mut elems = sorted_intersection(e1, e2);
        if let Some(r) = reject {
            elems.retain(|&x| x != r);
        }
        PairMaxSets { a, b, elems }
    }

    /// Inclusion order between the common sets of two pairs.
    pub fn comp(&self, other: &Self) -> SetOrder {
        comp_sets(&self.elems, &other.elems)
    }
}

/// Result of comparing two sorted sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOrder {
    Subset,
    Equal,
    Superset,
    Incomparable,
}

/// Inclusion order of two sorted, deduplicated lists.
pub(crate) fn comp_sets(e1: &[usize], e2: &[usize]) -> SetOrder {
    let (mut leq, mut geq) = (e1.len() <= e2.len(), e1.len() >= e2.len());
    let same = e1.len() == e2.len();
    let (mut i, mut j) = (0, 0);
    while i < e1.len() && j < e2.len() {
        if e1[i] < e2[j] {
            if !geq || same {
                return SetOrder::Incomparable;
            }
            leq = false;
            i += 1;
        } else if e1[i] > e2[j] {
            if !leq || same {
                return SetOrder::Incomparable;
            }
            geq = false;
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    if i < e1.len() {
        if !geq {
            return SetOrder::Incomparable;
        }
        leq = false;
    }
    if j < e2.len() || !geq {
        if !leq {
            return SetOrder::Incomparable;
        }
        return SetOrder::Subset;
    }
    if leq {
        SetOrder::Equal
    } else {
        SetOrder::Superset
    }
}

/// Keep only the pairs whose common set is maximal for inclusion; among
/// equal sets the first one wins.
pub(crate) fn maximal_pairs<T: Copy>(pairs: impl IntoIterator<Item = PairMaxSets<T>>) -> Vec<PairMaxSets<T>> {
    let mut maxset: Vec<PairMaxSets<T>> = Vec::new();
    for actuel in pairs {
        // kept entries are compacted into maxset[..l]
        let (mut k, mut l) = (0, 0);
        let mut placed = false;
        while k < maxset.len() {
            match actuel.comp(&maxset[k]) {
                SetOrder::Incomparable => {
                    if k != l {
                        maxset.swap(k, l);
                    }
                    k += 1;
                    l += 1;
                }
                SetOrder::Subset | SetOrder::Equal => {
                    placed = true;
                    break;
                }
                SetOrder::Superset => {
                    if !placed {
                        maxset[k] = actuel.clone();
                        placed = true;
                        l += 1;
                    }
                    k += 1;
                }
            }
        }
        if l < k {
            maxset.drain(l..k);
        } else if !placed {
            maxset.push(actuel);
        }
    }
    maxset
}

/// Sorted intersection of two sorted lists.
pub(crate) fn sorted_intersection(e1: &[usize], e2: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(e1.len().min(e2.len()));
    let (mut i, mut j) = (0, 0);
    while i < e1.len() && j < e2.len() {
        match e1[i].cmp(&e2[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(e1[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Insert `x` into a sorted list, keeping it deduplicated.
pub(crate) fn insert_sorted(list: &mut Vec<usize>, x: usize) {
    if let Err(pos) = list.binary_search(&x) {
        list.insert(pos, x);
    }
}

/// Exponent `e` of `x = m·2^e` with `|m| ∈ [0.5, 1)`.
fn frexp_exp(x: f64) -> Option<i32> {
    if x == 0.0 || !x.is_finite() {
        return None;
    }
    let biased = ((x.to_bits() >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // subnormal
        return Some(-1022);
    }
    Some(biased - 1022)
}

fn reduce_exponent(mags: impl Iterator<Item = f64>) -> Option<i32> {
    let fx = mags.filter_map(frexp_exp).max()?;
    (fx.abs() >= REDUCE_EXP).then_some(fx)
}

/// Rescale a homogeneous vector by a power of two so that its largest
/// entry has a moderate exponent. The scaling is exact.
pub(crate) fn reduce_vector(v: &mut IntervalVector) {
    if let Some(fx) = reduce_exponent(v.iter().map(|x| x.mag())) {
        let s = crate::interval::Interval::point(2f64.powi(-fx));
        for x in v.iter_mut() {
            *x = *x * s;
        }
    }
}

/// Same rescaling for a constraint `row·x ≤ rhs`.
pub(crate) fn reduce_row(row: &mut Vector, rhs: &mut f64) {
    if let Some(fx) = reduce_exponent(row.iter().map(|x| x.abs()).chain(std::iter::once(rhs.abs()))) {
        let s = 2f64.powi(-fx);
        row.apply(|x| *x *= s);
        *rhs *= s;
    }
}
