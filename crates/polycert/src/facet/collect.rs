//! Ordered, deduplicating collection of facets.
//!
//! Facets live in a `BTreeMap` keyed by `FacetBase`; ids (starting at 1)
//! index a secondary array. Removing a facet leaves an empty slot in that
//! array until `renumber` compacts the ids.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Included};

use super::{Facet, FacetBase, FacetRef, FacetRhs};
use crate::interval::{Interval, IntervalMatrix, IntervalVector};
use crate::{Matrix, Vector};

/// Policy applied when an inserted or modified facet has the same row as an
/// existing one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Keep the existing facet unchanged.
    #[default]
    KeepRhs,
    /// Overwrite the existing bound.
    ChangeRhs,
    /// Keep the largest bound (union). Two different equalities become a
    /// band of two inequalities.
    MaxRhs,
    /// Keep the smallest bound (intersection); may report emptiness.
    MinRhs,
}

/// Outcome of an insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// A new facet was created with this id.
    New(usize),
    /// An existing facet (this id) took the new bound.
    Updated(usize),
    /// A duplicate existed and was kept as is.
    Unchanged,
    /// The duplicate bounds are contradictory (`MinRhs` only).
    Empty,
}

impl Insertion {
    /// Id of the facet that now holds the constraint, if any.
    pub fn id(self) -> Option<usize> {
        match self {
            Insertion::New(id) | Insertion::Updated(id) => Some(id),
            _ => None,
        }
    }
}

/// Outcome of changing the row of an existing facet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rekey {
    /// The facet kept its id under the new row.
    Moved(usize),
    /// The new row existed already: that entry now carries `id` and its
    /// former id `absorbed` became an empty slot.
    Merged { id: usize, absorbed: usize },
    /// The new row existed already with a tighter bound; the facet was dropped.
    Dropped,
}

#[derive(Clone, Debug, Default)]
pub struct CollectFacets {
    dim: usize,
    map: BTreeMap<FacetBase, FacetRhs>,
    all: Vec<Option<FacetBase>>,
    eq: Vec<usize>,
    removed: usize,
}

impl CollectFacets {
    pub fn new(dim: usize) -> Self {
        CollectFacets {
            dim,
            ..Default::default()
        }
    }

    /// Facets `mat.row(i)·x ≤ rhs[i]`; rows listed in `eq_set` are
    /// equalities. Panics on duplicate rows.
    pub fn from_rows(mat: &Matrix, rhs: &Vector, eq_set: &[usize]) -> Self {
        assert_eq!(mat.nrows(), rhs.len());
        let mut cf = CollectFacets::new(mat.ncols());
        for i in 0..mat.nrows() {
            let ins = cf.insert(mat.row(i).transpose(), rhs[i], eq_set.contains(&i), DuplicateAction::KeepRhs);
            assert!(matches!(ins, Insertion::New(_)), "duplicate row {i} in facet collection");
        }
        cf
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of live facets.
    #[inline]
    pub fn nb_facets(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn nb_eq_facets(&self) -> usize {
        self.eq.len()
    }

    /// Size of the id space (live facets plus empty slots).
    #[inline]
    pub fn id_bound(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Facets in key order.
    pub fn iter(&self) -> impl Iterator<Item = FacetRef<'_>> + '_ {
        self.map.iter().map(|(base, rhs)| FacetRef { base, rhs })
    }

    /// Facet with the given id, if still live.
    pub fn get(&self, id: usize) -> Option<FacetRef<'_>> {
        let key = self.all.get(id.checked_sub(1)?)?.as_ref()?;
        let (base, rhs) = self.map.get_key_value(key)?;
        Some(FacetRef { base, rhs })
    }

    /// The `k`-th equality.
    pub fn eq_facet(&self, k: usize) -> FacetRef<'_> {
        let id = self.eq[k] + 1;
        self.get(id).expect("equality list points to a live facet")
    }

    /// Ids of the equalities.
    pub fn eq_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.eq.iter().map(|i| i + 1)
    }

    /// Position of facet `id` in the equality list.
    pub fn eq_position(&self, id: usize) -> Option<usize> {
        self.eq.iter().position(|&i| i + 1 == id)
    }

    /// Facet with exactly this row.
    pub fn find(&self, base: &FacetBase) -> Option<FacetRef<'_>> {
        let (base, rhs) = self.map.get_key_value(base)?;
        Some(FacetRef { base, rhs })
    }

    /// Last facet with a key strictly below `base`, and first facet with a
    /// key strictly above.
    pub fn neighbours(&self, base: &FacetBase) -> (Option<FacetRef<'_>>, Option<FacetRef<'_>>) {
        let before = self
            .map
            .range(..base)
            .next_back()
            .map(|(base, rhs)| FacetRef { base, rhs });
        let after = self
            .map
            .range((Excluded(base), std::ops::Bound::Unbounded))
            .next()
            .map(|(base, rhs)| FacetRef { base, rhs });
        (before, after)
    }

    pub fn insert(&mut self, row: Vector, rhs: f64, eq: bool, act: DuplicateAction) -> Insertion {
        debug_assert_eq!(row.len(), self.dim);
        self.insert_base(FacetBase::new(row), rhs, eq, act)
    }

    pub fn insert_facet(&mut self, facet: &Facet, act: DuplicateAction) -> Insertion {
        self.insert_base(facet.base.clone(), facet.rhs.rhs, facet.rhs.eq, act)
    }

    fn insert_base(&mut self, base: FacetBase, rhs: f64, eq: bool, act: DuplicateAction) -> Insertion {
        let Some(old) = self.map.get(&base).copied() else {
            let id = self.all.len() + 1;
            self.all.push(Some(base.clone()));
            self.map.insert(base, FacetRhs { rhs, eq, id });
            if eq {
                self.eq.push(id - 1);
            }
            return Insertion::New(id);
        };
        let (new_rhs, new_eq) = match act {
            DuplicateAction::KeepRhs => return Insertion::Unchanged,
            DuplicateAction::ChangeRhs => (rhs, eq),
            DuplicateAction::MaxRhs => {
                if old.eq && eq {
                    if old.rhs == rhs {
                        return Insertion::Unchanged;
                    }
                    // two parallel hyperplanes: keep the band between them
                    if let Some(entry) = self.map.get_mut(&base) {
                        entry.rhs = old.rhs.max(rhs);
                        entry.eq = false;
                    }
                    self.remove_in_eq(old.id - 1);
                    let mut neg = base;
                    neg.negate_row();
                    return self.insert_base(neg, -old.rhs.min(rhs), false, DuplicateAction::MaxRhs);
                }
                if old.rhs >= rhs && !old.eq {
                    return Insertion::Unchanged;
                }
                (old.rhs.max(rhs), false)
            }
            DuplicateAction::MinRhs => {
                if old.rhs <= rhs {
                    if !eq {
                        return Insertion::Unchanged;
                    }
                    if old.rhs < rhs {
                        return Insertion::Empty;
                    }
                } else if old.eq {
                    return Insertion::Empty;
                }
                (rhs, eq)
            }
        };
        if let Some(entry) = self.map.get_mut(&base) {
            entry.rhs = new_rhs;
            entry.eq = new_eq;
        }
        if new_eq && !old.eq {
            self.eq.push(old.id - 1);
        } else if !new_eq && old.eq {
            self.remove_in_eq(old.id - 1);
        }
        Insertion::Updated(old.id)
    }

    fn remove_in_eq(&mut self, idx: usize) {
        if let Some(k) = self.eq.iter().position(|&i| i == idx) {
            self.eq.swap_remove(k);
        }
    }

    fn take(&mut self, id: usize) -> (FacetBase, FacetRhs) {
        let key = self.all[id - 1].take().expect("live facet id");
        let (base, rhs) = self.map.remove_entry(&key).expect("id points to a live facet");
        self.removed += 1;
        (base, rhs)
    }

    /// Put back a facet taken out of the map with a new key. On collision
    /// `act` decides which bound wins.
    fn reinsert(&mut self, id: usize, base: FacetBase, rhs: f64, eq: bool, act: DuplicateAction) -> Rekey {
        self.removed -= 1;
        if let Some(old) = self.map.get(&base).copied() {
            let replace = act == DuplicateAction::ChangeRhs
                || (act == DuplicateAction::MaxRhs && old.rhs < rhs)
                || (act == DuplicateAction::MinRhs && old.rhs > rhs);
            if replace {
                if old.eq {
                    self.remove_in_eq(old.id - 1);
                }
                self.all[old.id - 1] = None;
                self.removed += 1;
                self.all[id - 1] = Some(base.clone());
                self.map.insert(base, FacetRhs { rhs, eq, id });
                return Rekey::Merged { id, absorbed: old.id };
            }
            self.removed += 1;
            if eq {
                self.remove_in_eq(id - 1);
            }
            return Rekey::Dropped;
        }
        self.all[id - 1] = Some(base.clone());
        self.map.insert(base, FacetRhs { rhs, eq, id });
        Rekey::Moved(id)
    }

    /// Replace the row and bound of the `k`-th equality.
    pub fn change_eq_facet(&mut self, k: usize, row: Vector, rhs: f64, act: DuplicateAction) -> Rekey {
        let id = self.eq[k] + 1;
        let (mut base, _) = self.take(id);
        base.change_row(row);
        self.reinsert(id, base, rhs, true, act)
    }

    /// Replace the row and bound of an inequality.
    pub fn change_ineq_facet(&mut self, id: usize, row: Vector, rhs: f64, act: DuplicateAction) -> Rekey {
        let (mut base, old) = self.take(id);
        debug_assert!(!old.eq);
        base.change_row(row);
        self.reinsert(id, base, rhs, false, act)
    }

    /// Change the bound of a facet in place.
    pub fn change_rhs(&mut self, id: usize, rhs: f64) {
        let key = self.all[id - 1].as_ref().expect("live facet id");
        if let Some(entry) = self.map.get_mut(key) {
            entry.rhs = rhs;
        }
    }

    /// Turn the `k`-th equality `row·x = rhs` into inequalities covering
    /// `[min(rhs, nbound), max(rhs, nbound)]`:
    /// - `nbound ≤ rhs`: keep `row·x ≤ rhs`, add `−row·x ≤ −nbound`;
    /// - `nbound > rhs`: set `row·x ≤ nbound`, add `−row·x ≤ −rhs`.
    ///
    /// Infinite `nbound` adds nothing on its side (`+∞` flips the row).
    /// Returns the id of the facet created or updated for the new side,
    /// the facet itself for `nbound = −∞`.
    pub fn dissociate_eq_facet(&mut self, k: usize, nbound: f64, act: DuplicateAction) -> Option<usize> {
        let idx = self.eq.swap_remove(k);
        let id = idx + 1;
        let key = self.all[idx].clone().expect("live equality");
        let entry = self.map.get_mut(&key).expect("equality in map");
        entry.eq = false;
        let rhs = entry.rhs;
        let mut neg = key;
        neg.negate_row();
        if nbound <= rhs {
            if nbound > f64::NEG_INFINITY {
                self.insert_base(neg, -nbound, false, act).id()
            } else {
                Some(id)
            }
        } else if nbound < f64::INFINITY {
            let ins = self.insert_base(neg, -rhs, false, act);
            self.change_rhs(id, nbound);
            ins.id()
        } else {
            let _ = self.take(id);
            match self.reinsert(id, neg, -rhs, false, act) {
                Rekey::Moved(id) | Rekey::Merged { id, .. } => Some(id),
                Rekey::Dropped => None,
            }
        }
    }

    /// Remove a facet; `false` if the id was already empty.
    pub fn remove_by_id(&mut self, id: usize) -> bool {
        let live = id.checked_sub(1).and_then(|k| self.all.get(k)).is_some_and(Option::is_some);
        if !live {
            return false;
        }
        let (_, rhs) = self.take(id);
        if rhs.eq {
            self.remove_in_eq(id - 1);
        }
        true
    }

    /// Take out every axis-aligned facet (and the null row) and return the
    /// box they define. An infeasible null row or contradictory bounds give
    /// an empty box.
    pub fn extract_box(&mut self) -> IntervalVector {
        let n = self.dim;
        let null = FacetBase::new(Vector::zeros(n));
        if let Some(r) = self.map.get(&null).copied() {
            if r.rhs < 0.0 || (r.rhs > 0.0 && r.eq) {
                return IntervalVector::empty(n);
            }
            self.remove_by_id(r.id);
        }
        let mut ret = IntervalVector::entire(n);
        for i in 0..n {
            for neg in [false, true] {
                let (lo, hi) = FacetBase::base_range(n, i, neg);
                let found: Vec<(f64, FacetRhs)> = self
                    .map
                    .range((Included(&lo), Excluded(&hi)))
                    .map(|(b, r)| (b.row[i], *r))
                    .collect();
                for (coef, r) in found {
                    if ret[i].is_empty() {
                        break;
                    }
                    let q = Interval::point(r.rhs) / coef;
                    ret[i] = if r.eq {
                        ret[i] & q
                    } else if neg {
                        ret[i].max(&q)
                    } else {
                        ret[i].min(&q)
                    };
                    self.remove_by_id(r.id);
                }
            }
            if ret[i].is_empty() {
                ret.set_empty();
                break;
            }
        }
        ret
    }

    /// Compact the ids after removals. Returns, for each old id `k`, the new
    /// id at index `k − 1` (`None` for removed facets). Empty when nothing
    /// was removed.
    pub fn renumber(&mut self) -> Vec<Option<usize>> {
        if self.removed == 0 {
            return Vec::new();
        }
        let mut ret = vec![None; self.all.len()];
        self.all.clear();
        self.eq.clear();
        for (k, (base, rhs)) in self.map.iter_mut().enumerate() {
            ret[rhs.id - 1] = Some(k + 1);
            rhs.id = k + 1;
            if rhs.eq {
                self.eq.push(k);
            }
            self.all.push(Some(base.clone()));
        }
        self.removed = 0;
        ret
    }

    /// Grow the bound of every facet `f` to `max_v f.row·v` over `vertices`
    /// (only that maximum when `tight`). Equalities no longer satisfied
    /// exactly become two inequalities. `bbox` takes the hull of the vertices
    /// (reset first when `tight`).
    pub fn encompass_vertices(&mut self, vertices: &[IntervalVector], bbox: &mut IntervalVector, tight: bool) {
        if tight {
            *bbox = IntervalVector::empty(self.dim);
        }
        if vertices.is_empty() {
            return;
        }
        self.encompass_with(tight, |row| {
            vertices
                .iter()
                .fold(Interval::EMPTY, |a, v| a | v.dot_row(row))
        });
        for v in vertices {
            *bbox |= v;
        }
    }

    /// Grow the bounds to enclose the zonotope `z + A·range`.
    pub fn encompass_zonotope(&mut self, z: &IntervalVector, a: &IntervalMatrix, range: &IntervalVector, tight: bool) {
        self.encompass_with(tight, |row| z.dot_row(row) + a.row_mul(row).dot(range));
    }

    fn encompass_with(&mut self, tight: bool, mut image: impl FnMut(&Vector) -> Interval) {
        let mut split = Vec::new();
        for (base, rhs) in self.map.iter_mut() {
            let start = if tight { Interval::EMPTY } else { Interval::point(rhs.rhs) };
            let a = start | image(&base.row);
            rhs.rhs = a.ub();
            if rhs.eq && !a.is_degenerated() {
                rhs.eq = false;
                split.push((rhs.id, base.clone(), a.lb()));
            }
        }
        for (id, mut base, lb) in split {
            self.remove_in_eq(id - 1);
            base.negate_row();
            self.insert_base(base, -lb, false, DuplicateAction::KeepRhs);
        }
    }

    /// Add every facet of `other`. Returns the number of new facets, or
    /// `None` when a duplicate made the system infeasible.
    pub fn merge(&mut self, other: &CollectFacets, act: DuplicateAction) -> Option<usize> {
        let mut count = 0;
        for (base, rhs) in &other.map {
            match self.insert_base(base.clone(), rhs.rhs, rhs.eq, act) {
                Insertion::Empty => return None,
                Insertion::New(_) => count += 1,
                _ => {}
            }
        }
        Some(count)
    }
}

impl fmt::Display for CollectFacets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Collectfacets : {} facets", self.map.len())?;
        for fct in self.iter() {
            writeln!(f, "{fct}")?;
        }
        writeln!(f, " end Collectfacets")
    }
}
