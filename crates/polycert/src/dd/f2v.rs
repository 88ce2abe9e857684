//! Facet to vertex enumeration.
//!
//! Vertices are homogeneous vectors `(v₀, y)` over the flat of the
//! equalities: `v₀ > 0` is the point `M·(1, y/v₀)`, `v₀ = 0` a ray. Facets
//! are stored as codes only; each vertex keeps the sorted codes of the
//! facets it lies on. One facet may own several codes (one per connected
//! component of removed vertices), so incidence is always grouped by
//! `FacetCode` before being compared.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

use super::{comp_sets, insert_sorted, maximal_pairs, reduce_row, reduce_vector, sorted_intersection, NodeStatus, PairMaxSets, SetOrder};
use crate::cfg::F2V_EPS;
use crate::facet::{bwd_dot, CollectFacets, FacetRef};
use crate::interval::{EqFlat, Interval, IntervalVector};
use crate::polytope::Update;
use crate::Vector;

/// What a facet code of a vertex refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FacetCode {
    /// Facet of the collection, by id.
    Facet(usize),
    /// `x_c ≤ ub` from the bounding box.
    Upper(usize),
    /// `x_c ≥ lb` from the bounding box.
    Lower(usize),
    /// Face at infinity created when a line is removed.
    Infinity,
    /// Facet removed from the collection.
    Dropped,
}

impl FacetCode {
    fn is_real(self) -> bool {
        !matches!(self, FacetCode::Infinity | FacetCode::Dropped)
    }
}

/// Vertex (or ray) of the current enumeration.
#[derive(Clone, Debug)]
pub struct DdVertex {
    id: usize,
    vertex: IntervalVector,
    lambda: Interval,
    fcts: Vec<usize>,
    status: NodeStatus,
    links: Vec<usize>,
}

impl DdVertex {
    fn new(id: usize, vertex: IntervalVector) -> Self {
        DdVertex {
            id,
            vertex,
            lambda: Interval::ZERO,
            fcts: Vec::new(),
            status: NodeStatus::New,
            links: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Homogeneous coordinates `(v₀, y)` in the flat.
    #[inline]
    pub fn homogeneous(&self) -> &IntervalVector {
        &self.vertex
    }

    /// Sorted codes of the facets through the vertex.
    #[inline]
    pub fn facet_codes(&self) -> &[usize] {
        &self.fcts
    }

    /// Slots of the adjacent vertices.
    #[inline]
    pub fn links(&self) -> &[usize] {
        &self.links
    }

    pub fn is_ray(&self) -> bool {
        self.vertex[0] == Interval::ZERO
    }

    fn add_fct(&mut self, code: usize) {
        insert_sorted(&mut self.fcts, code);
    }

    fn add_lnk(&mut self, slot: usize) -> bool {
        if self.links.contains(&slot) {
            return false;
        }
        self.links.push(slot);
        true
    }

    fn remove_lnk(&mut self, slot: usize) {
        self.links.retain(|&l| l != slot);
    }

    fn change_lnk(&mut self, old: usize, new: usize) {
        for l in self.links.iter_mut().filter(|l| **l == old) {
            *l = new;
        }
    }
}

impl fmt::Display for DdVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {} fcts {:?} links {:?}", self.id, self.vertex, self.fcts, self.links)
    }
}

/// Outside vertex waiting in the elimination queue; the farthest one
/// (largest `λ/v₀`) comes out first, rays last of all.
struct Queued {
    key: f64,
    slot: usize,
}

impl Queued {
    fn new(slot: usize, v: &DdVertex) -> Self {
        let v0 = v.vertex[0].lb();
        let key = if v0 > 0.0 { v.lambda.lb() / v0 } else { f64::INFINITY };
        Queued { key, slot }
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.total_cmp(&other.key).then_with(|| other.slot.cmp(&self.slot))
    }
}

/// `a·x + b·y` in interval arithmetic.
fn lin(a: f64, x: &IntervalVector, b: f64, y: &IntervalVector) -> IntervalVector {
    &(x * Interval::point(a)) + &(y * Interval::point(b))
}

fn unit(n: usize, i: usize) -> Vector {
    let mut v = Vector::zeros(n);
    v[i] = 1.0;
    v
}

/// Incremental facet → vertex enumeration.
#[derive(Clone, Debug)]
pub struct DdBuildF2V {
    dim: usize,
    fdim: usize,
    bbox: IntervalVector,
    flat: Option<EqFlat>,
    empty: bool,
    lines: Vec<IntervalVector>,
    vertices: Vec<DdVertex>,
    codes: Vec<FacetCode>,
    /// Collection ids handed to `add_facet`, sorted.
    seen: Vec<usize>,
    next_id: usize,
}

impl DdBuildF2V {
    /// Start from the flat of the equalities of `facets` intersected with
    /// `bbox`. With `include_box`, degenerate box components become
    /// equalities and finite bounds are cut as `Upper`/`Lower` codes;
    /// otherwise the box only serves the consistency check of the
    /// equalities. Inequalities of `facets` are not added.
    pub fn new(dim: usize, bbox: &IntervalVector, facets: &CollectFacets, include_box: bool) -> Self {
        assert_eq!(bbox.size(), dim, "box dimension mismatch");
        let mut dd = DdBuildF2V {
            dim,
            fdim: dim,
            bbox: bbox.clone(),
            flat: None,
            empty: false,
            lines: Vec::new(),
            vertices: Vec::new(),
            codes: Vec::new(),
            seen: Vec::new(),
            next_id: 0,
        };
        if bbox.is_empty() {
            dd.empty = true;
            return dd;
        }
        let mut eqs: Vec<(Vector, f64)> = Vec::new();
        if include_box {
            eqs.extend((0..dim).filter(|&i| bbox[i].is_degenerated()).map(|i| (unit(dim, i), bbox[i].lb())));
        }
        eqs.extend(facets.eq_ids().filter_map(|id| facets.get(id)).map(|f| (f.row().clone(), f.rhs())));
        if !eqs.is_empty() {
            match EqFlat::build(dim, &eqs, bbox) {
                Some(flat) => {
                    dd.fdim = flat.fdim();
                    dd.flat = Some(flat);
                }
                None => {
                    dd.empty = true;
                    return dd;
                }
            }
        }
        let mut origin = IntervalVector::zeros(dd.fdim + 1);
        origin[0] = Interval::ONE;
        dd.push_vertex(origin);
        dd.lines = (1..=dd.fdim)
            .map(|i| {
                let mut l = IntervalVector::zeros(dd.fdim + 1);
                l[i] = Interval::ONE;
                l
            })
            .collect();
        if include_box {
            for i in (0..dim).filter(|&i| !bbox[i].is_degenerated()) {
                if bbox[i].ub() < f64::INFINITY && dd.add_row(FacetCode::Upper(i), &unit(dim, i), bbox[i].ub()) == Update::Empty {
                    return dd;
                }
                if bbox[i].lb() > f64::NEG_INFINITY && dd.add_row(FacetCode::Lower(i), &-unit(dim, i), -bbox[i].lb()) == Update::Empty {
                    return dd;
                }
            }
        }
        dd
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Dimension of the flat the vertices live in.
    #[inline]
    pub fn fdim(&self) -> usize {
        self.fdim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn flat(&self) -> Option<&EqFlat> {
        self.flat.as_ref()
    }

    pub fn bbox(&self) -> &IntervalVector {
        &self.bbox
    }

    pub fn vertices(&self) -> &[DdVertex] {
        &self.vertices
    }

    pub fn lines(&self) -> &[IntervalVector] {
        &self.lines
    }

    pub fn codes(&self) -> &[FacetCode] {
        &self.codes
    }

    /// No line and no ray.
    pub fn is_bounded(&self) -> bool {
        self.lines.is_empty() && !self.vertices.iter().any(DdVertex::is_ray)
    }

    /// Enclosure of a vertex (or direction of a ray or line) in the
    /// original coordinates.
    pub fn compute_vertex(&self, v: &IntervalVector) -> IntervalVector {
        match &self.flat {
            Some(flat) => flat.point(v),
            None => {
                let tail = v.iter().skip(1).copied();
                if v[0] == Interval::ZERO {
                    tail.collect()
                } else {
                    tail.map(|x| x / v[0]).collect()
                }
            }
        }
    }

    /// Enclosures of the finite vertices.
    pub fn points(&self) -> Vec<IntervalVector> {
        self.vertices
            .iter()
            .filter(|v| !v.is_ray())
            .map(|v| self.compute_vertex(&v.vertex))
            .collect()
    }

    /// Add an inequality of the collection.
    pub fn add_facet(&mut self, facet: FacetRef<'_>) -> Update {
        assert!(!facet.is_eq(), "equality facets go into the flat");
        insert_sorted(&mut self.seen, facet.id());
        self.add_row(FacetCode::Facet(facet.id()), facet.row(), facet.rhs())
    }

    /// Add `x_c ≤ rhs` (`mx`) or `−x_c ≤ rhs`.
    pub fn add_bound_var(&mut self, c: usize, mx: bool, rhs: f64) -> Update {
        let mut row = unit(self.dim, c);
        let code = if mx {
            let b = self.bbox[c];
            self.bbox[c] = b & Interval::new(f64::NEG_INFINITY, rhs);
            FacetCode::Upper(c)
        } else {
            row.neg_mut();
            let b = self.bbox[c];
            self.bbox[c] = b & Interval::new(-rhs, f64::INFINITY);
            FacetCode::Lower(c)
        };
        self.add_row(code, &row, rhs)
    }

    /// Cut by the bounds of `b` that are tighter than the current box.
    pub fn add_constraint_box(&mut self, b: &IntervalVector) -> Update {
        let mut res = Update::Unchanged;
        for i in 0..self.dim {
            if b[i].ub() < self.bbox[i].ub() {
                match self.add_bound_var(i, true, b[i].ub()) {
                    Update::Empty => return Update::Empty,
                    Update::Changed => res = Update::Changed,
                    Update::Unchanged => {}
                }
            }
            if b[i].lb() > self.bbox[i].lb() {
                match self.add_bound_var(i, false, -b[i].lb()) {
                    Update::Empty => return Update::Empty,
                    Update::Changed => res = Update::Changed,
                    Update::Unchanged => {}
                }
            }
        }
        res
    }

    /// Hull of the vertices; rays and lines open the matching sides.
    pub fn build_bbox(&self) -> IntervalVector {
        let mut b = IntervalVector::empty(self.dim);
        if self.empty {
            return b;
        }
        let mut dirs = Vec::new();
        for v in &self.vertices {
            let p = self.compute_vertex(&v.vertex);
            if v.is_ray() {
                dirs.push(p);
            } else {
                b |= &p;
            }
        }
        if b.is_empty() {
            return b;
        }
        for l in &self.lines {
            let d = self.compute_vertex(l);
            for i in (0..self.dim).filter(|&i| d[i] != Interval::ZERO) {
                b[i] = Interval::ENTIRE;
            }
        }
        for d in &dirs {
            for i in 0..self.dim {
                if d[i].ub() > 0.0 {
                    b[i] = Interval::new(b[i].lb(), f64::INFINITY);
                }
                if d[i].lb() < 0.0 {
                    b[i] = Interval::new(f64::NEG_INFINITY, b[i].ub());
                }
            }
        }
        b
    }

    /// Ids of facets given to `add_facet` that support no facet of the
    /// enumerated polyhedron: either they touch fewer vertices than a
    /// facet needs, or their vertex set is strictly contained in another
    /// one, or it duplicates a box bound or a facet with a smaller id.
    /// Their codes become `Dropped`.
    pub fn redundant_facets(&mut self) -> Vec<usize> {
        if self.empty {
            return Vec::new();
        }
        let mut groups: BTreeMap<FacetCode, Vec<usize>> = BTreeMap::new();
        for (slot, v) in self.vertices.iter().enumerate() {
            for &c in &v.fcts {
                let code = self.codes[c];
                if code.is_real() {
                    let set = groups.entry(code).or_default();
                    if set.last() != Some(&slot) {
                        set.push(slot);
                    }
                }
            }
        }
        let need = self.fdim.saturating_sub(self.lines.len());
        let mut redundant: BTreeSet<usize> = self
            .seen
            .iter()
            .copied()
            .filter(|id| !groups.contains_key(&FacetCode::Facet(*id)))
            .collect();
        for (code, set) in &groups {
            let FacetCode::Facet(id) = *code else { continue };
            if set.len() < need {
                redundant.insert(id);
                continue;
            }
            let dominated = groups.iter().any(|(other, set2)| {
                other != code
                    && match comp_sets(set, set2) {
                        SetOrder::Subset => true,
                        SetOrder::Equal => match *other {
                            FacetCode::Facet(id2) => id2 < id,
                            _ => true,
                        },
                        _ => false,
                    }
            });
            if dominated {
                redundant.insert(id);
            }
        }
        for code in self.codes.iter_mut() {
            if let FacetCode::Facet(id) = *code {
                if redundant.contains(&id) {
                    *code = FacetCode::Dropped;
                }
            }
        }
        self.seen.retain(|id| !redundant.contains(id));
        tracing::debug!(count = redundant.len(), "redundant facets");
        redundant.into_iter().collect()
    }

    /// Follow a renumbering of the collection (`map[id − 1]` is the new
    /// id, `None` for removed facets). An empty map is the identity.
    pub fn update_renumber(&mut self, map: &[Option<usize>]) {
        if map.is_empty() {
            return;
        }
        let remap = |id: usize| map.get(id - 1).copied().flatten();
        for code in self.codes.iter_mut() {
            if let FacetCode::Facet(id) = *code {
                *code = remap(id).map_or(FacetCode::Dropped, FacetCode::Facet);
            }
        }
        self.seen = self.seen.iter().filter_map(|&id| remap(id)).collect();
        self.seen.sort_unstable();
    }

    fn set_empty(&mut self) {
        self.empty = true;
        self.vertices.clear();
        self.lines.clear();
    }

    fn push_vertex(&mut self, mut v: IntervalVector) -> usize {
        reduce_vector(&mut v);
        self.next_id += 1;
        self.vertices.push(DdVertex::new(self.next_id, v));
        self.vertices.len() - 1
    }

    fn link(&mut self, a: usize, b: usize) {
        if self.vertices[a].add_lnk(b) {
            self.vertices[b].add_lnk(a);
        }
    }

    /// `row·x ≤ rhs` as a homogeneous row over the flat.
    fn homogeneous_facet(&self, row: &Vector, rhs: f64) -> IntervalVector {
        match &self.flat {
            Some(flat) => flat.reduce(row, rhs),
            None => std::iter::once(Interval::point(-rhs))
                .chain(row.iter().map(|&x| Interval::point(x)))
                .collect(),
        }
    }

    fn add_row(&mut self, code: FacetCode, row: &Vector, rhs: f64) -> Update {
        if self.empty {
            return Update::Empty;
        }
        let (mut row, mut rhs) = (row.clone(), rhs);
        reduce_row(&mut row, &mut rhs);
        let facet = self.homogeneous_facet(&row, rhs);
        if self.eliminate_line(code, &facet) {
            return Update::Changed;
        }
        self.cut(code, &facet)
    }

    /// Use the facet to bound the line on which it varies most; the other
    /// lines and the vertices are projected onto the hyperplane, and a ray
    /// pointing inside replaces the line.
    fn eliminate_line(&mut self, code: FacetCode, facet: &IntervalVector) -> bool {
        let best = self
            .lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| {
                let u = facet.dot(l);
                (!u.contains(0.0)).then(|| (i, u.mig()))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((best, _)) = best else { return false };
        let code_facet = self.codes.len();
        self.codes.push(code);
        let bst = self.lines.swap_remove(best);
        let ubest = facet.dot(&bst);
        for l in self.lines.iter_mut() {
            let u = facet.dot(l);
            *l = &(&*l * ubest) - &(&bst * u);
        }
        for v in self.vertices.iter_mut() {
            let lower = facet.dot(&v.vertex).lb();
            let (a, b) = match (ubest.lb() > 0.0, lower > 0.0) {
                (true, true) => (ubest.ub(), -lower),
                (true, false) => (ubest.lb(), -lower),
                (false, true) => (-ubest.lb(), lower),
                (false, false) => (-ubest.ub(), lower),
            };
            v.vertex = lin(a, &v.vertex, b, &bst);
            reduce_vector(&mut v.vertex);
            v.add_fct(code_facet);
        }
        let ray = if ubest.lb() < 0.0 { bst } else { -&bst };
        let others = self.vertices.len();
        let slot = self.push_vertex(ray);
        for o in 0..others {
            self.link(o, slot);
        }
        let inf_code = self.codes.len();
        self.codes.push(FacetCode::Infinity);
        let v = &mut self.vertices[slot];
        v.fcts = (0..code_facet).chain(std::iter::once(inf_code)).collect();
        tracing::debug!(lines = self.lines.len(), "line bounded");
        true
    }

    fn cut(&mut self, code: FacetCode, facet: &IntervalVector) -> Update {
        let mut nb_gt = 0;
        let mut notempty = false;
        for v in self.vertices.iter_mut() {
            v.lambda = facet.dot(&v.vertex);
            notempty |= v.lambda.lb() <= 0.0;
            v.status = if v.lambda.ub() < 0.0 {
                NodeStatus::In
            } else if v.lambda.lb() < 0.0 {
                NodeStatus::On
            } else if v.lambda.lb() < F2V_EPS {
                NodeStatus::Ge
            } else {
                nb_gt += 1;
                NodeStatus::Gt
            };
        }
        if !notempty {
            tracing::debug!("facet removes every vertex");
            self.set_empty();
            return Update::Empty;
        }
        if nb_gt == 0 {
            self.mark_touching(code, &[]);
            return Update::Unchanged;
        }

        let n0 = self.vertices.len();
        let mut queue: BinaryHeap<Queued> = BinaryHeap::new();
        let mut next = 0;
        let mut ref_code = 0;
        let mut new_codes = Vec::new();
        let min_common = self.fdim as isize - 3 - self.lines.len() as isize;
        loop {
            let act = if let Some(q) = queue.pop() {
                if self.vertices[q.slot].status != NodeStatus::Stack {
                    continue;
                }
                q.slot
            } else {
                if next >= n0 {
                    break;
                }
                next += 1;
                if self.vertices[next - 1].status != NodeStatus::Gt {
                    continue;
                }
                ref_code = self.codes.len();
                self.codes.push(code);
                new_codes.push(ref_code);
                next - 1
            };
            self.vertices[act].status = NodeStatus::Rem;
            let act_vertex = self.vertices[act].vertex.clone();
            let act_lambda = self.vertices[act].lambda;
            let act_fcts = self.vertices[act].fcts.clone();
            let links = std::mem::take(&mut self.vertices[act].links);

            let mut adjacent: Vec<(usize, Vec<usize>)> = Vec::new();
            for lnk in links {
                let dest = &mut self.vertices[lnk];
                if dest.status == NodeStatus::Gt {
                    dest.status = NodeStatus::Stack;
                    queue.push(Queued::new(lnk, dest));
                }
                let mut keep_on_facet = matches!(dest.status, NodeStatus::Ge | NodeStatus::Stack);
                if dest.status == NodeStatus::Rem {
                    continue;
                }
                let mut part = dest.vertex.clone();
                if dest.status == NodeStatus::On {
                    bwd_dot(facet, Interval::new(f64::NEG_INFINITY, 0.0), &mut part);
                    keep_on_facet |= part.is_empty();
                }
                let common = sorted_intersection(&dest.fcts, &act_fcts);
                if keep_on_facet {
                    adjacent.push((lnk, common));
                    dest.add_fct(ref_code);
                    dest.remove_lnk(act);
                    continue;
                }
                if -dest.lambda.lb() / act_lambda.lb() < F2V_EPS {
                    // close enough: widen the vertex instead of creating one
                    let q = Interval::point(dest.lambda.lb()) / act_lambda;
                    let ext = &part - &(&act_vertex * q);
                    dest.vertex |= &ext;
                    adjacent.push((lnk, common));
                    dest.add_fct(ref_code);
                    dest.remove_lnk(act);
                    continue;
                }
                let nv = lin(-dest.lambda.lb(), &act_vertex, act_lambda.lb(), &part);
                debug_assert!(!nv.is_empty());
                let slot = self.vertices.len();
                self.vertices[lnk].change_lnk(act, slot);
                let slot = self.push_vertex(nv);
                let created = &mut self.vertices[slot];
                created.lambda = Interval::ZERO;
                created.links.push(lnk);
                created.fcts = common.clone();
                created.add_fct(ref_code);
                created.status = NodeStatus::Ge;
                adjacent.push((slot, common));
            }

            let pairs = (0..adjacent.len()).flat_map(|i| {
                let adjacent = &adjacent;
                (i + 1..adjacent.len()).filter_map(move |j| {
                    let p = PairMaxSets::new(adjacent[i].0, adjacent[j].0, &adjacent[i].1, &adjacent[j].1, Some(ref_code));
                    ((p.elems.len() as isize) >= min_common).then_some(p)
                })
            });
            for pm in maximal_pairs(pairs) {
                self.link(pm.a, pm.b);
            }
        }
        self.mark_touching(code, &new_codes);
        let removed = self.purge();
        tracing::debug!(removed, vertices = self.vertices.len(), "facet inserted");
        Update::Changed
    }

    /// Give a code of the new facet to the kept vertices lying on it that
    /// were not reached from a removed vertex.
    fn mark_touching(&mut self, code: FacetCode, new_codes: &[usize]) {
        let touching: Vec<usize> = (0..self.vertices.len())
            .filter(|&s| {
                let v = &self.vertices[s];
                matches!(v.status, NodeStatus::On | NodeStatus::Ge) && !new_codes.iter().any(|c| v.fcts.binary_search(c).is_ok())
            })
            .collect();
        if touching.is_empty() {
            return;
        }
        let c = match new_codes.first() {
            Some(&c) => c,
            None => {
                self.codes.push(code);
                self.codes.len() - 1
            }
        };
        for s in touching {
            self.vertices[s].add_fct(c);
        }
    }

    /// Erase removed vertices and remap the links of the others.
    fn purge(&mut self) -> usize {
        let mut map = vec![None; self.vertices.len()];
        let mut k = 0;
        for (s, v) in self.vertices.iter().enumerate() {
            if v.status != NodeStatus::Rem {
                map[s] = Some(k);
                k += 1;
            }
        }
        let removed = self.vertices.len() - k;
        self.vertices.retain(|v| v.status != NodeStatus::Rem);
        for v in self.vertices.iter_mut() {
            v.links = v.links.iter().filter_map(|&l| map[l]).collect();
            v.status = NodeStatus::In;
        }
        removed
    }
}

impl fmt::Display for DdBuildF2V {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            return writeln!(f, "DDbuildF2V (empty, dim {})", self.dim);
        }
        writeln!(
            f,
            "DDbuildF2V : dim {} fdim {} : {} vertices, {} lines",
            self.dim,
            self.fdim,
            self.vertices.len(),
            self.lines.len()
        )?;
        for v in &self.vertices {
            writeln!(f, "  {v}")?;
            if !v.is_ray() {
                writeln!(f, "    = {}", self.compute_vertex(&v.vertex))?;
            }
        }
        for l in &self.lines {
            writeln!(f, "  line {l}")?;
        }
        Ok(())
    }
}
