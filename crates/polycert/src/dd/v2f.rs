//! Vertex to facet enumeration.
//!
//! The build owns its `CollectFacets`. While every vertex seen so far lies
//! on an affine flat, the flat is kept as equalities; the first vertex off
//! the flat splits one equality into inequalities. After that, each vertex
//! removes the facets it violates and replaces them by combinations with
//! their inside neighbours (`add_facet_son`).

use std::fmt;

use super::{insert_sorted, maximal_pairs, reduce_row, sorted_intersection, NodeStatus, PairMaxSets};
use crate::cfg::V2F_EPS;
use crate::facet::{CollectFacets, DuplicateAction, FacetRef, Insertion, Rekey};
use crate::interval::{Interval, IntervalVector};
use crate::Vector;

/// Facet of the current hull, with the ids of the vertices on it.
#[derive(Clone, Debug)]
pub struct DdFacet {
    /// Id in the owned collection.
    id: usize,
    lambda: f64,
    status: NodeStatus,
    links: Vec<usize>,
    vtx: Vec<usize>,
}

impl DdFacet {
    fn new(id: usize, links: Vec<usize>, vtx: Vec<usize>) -> Self {
        DdFacet {
            id,
            lambda: 0.0,
            status: NodeStatus::New,
            links,
            vtx,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Sorted ids of the vertices on the facet.
    #[inline]
    pub fn vertex_ids(&self) -> &[usize] {
        &self.vtx
    }

    #[inline]
    pub fn links(&self) -> &[usize] {
        &self.links
    }

    fn add_lnk(&mut self, slot: usize) {
        if !self.links.contains(&slot) {
            self.links.push(slot);
        }
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

/// Incremental vertex → facet enumeration.
#[derive(Clone, Debug)]
pub struct DdBuildV2F {
    facets: CollectFacets,
    nodes: Vec<DdFacet>,
    /// Vertices on the flat of the equalities.
    id_vertices: Vec<usize>,
}

impl DdBuildV2F {
    /// Hull of a single vertex: the equalities `x_i = v_i`.
    pub fn new(id_vertex: usize, vertex: &Vector) -> Self {
        let n = vertex.len();
        let mut facets = CollectFacets::new(n);
        for i in 0..n {
            let mut row = Vector::zeros(n);
            row[i] = 1.0;
            facets.insert(row, vertex[i], true, DuplicateAction::KeepRhs);
        }
        DdBuildV2F {
            facets,
            nodes: Vec::new(),
            id_vertices: vec![id_vertex],
        }
    }

    pub fn facets(&self) -> &CollectFacets {
        &self.facets
    }

    pub fn into_facets(self) -> CollectFacets {
        self.facets
    }

    /// Inequality facets of the hull.
    pub fn nodes(&self) -> &[DdFacet] {
        &self.nodes
    }

    pub fn add_point(&mut self, id_vertex: usize, vertex: &Vector) -> usize {
        self.add_vertex(id_vertex, &IntervalVector::from_point(vertex))
    }

    /// Extend the hull with a vertex; returns the number of facets created.
    pub fn add_vertex(&mut self, id_vertex: usize, vertex: &IntervalVector) -> usize {
        assert_eq!(vertex.size(), self.facets.dim(), "vertex dimension mismatch");
        if self.facets.nb_eq_facets() > 0 {
            match self.absorb_equalities(id_vertex, vertex) {
                Some(cnt) => {
                    if self.facets.nb_eq_facets() > 0 {
                        self.id_vertices.push(id_vertex);
                    }
                    tracing::debug!(vertex = id_vertex, created = cnt, eqs = self.facets.nb_eq_facets(), "flat widened");
                    return cnt;
                }
                None => self.id_vertices.push(id_vertex),
            }
        }

        for n in self.nodes.iter_mut() {
            let f = self.facets.get(n.id).expect("hull facet is live");
            let calc = vertex.dot_row(f.row()) - f.rhs();
            n.lambda = calc.lb();
            n.status = if calc.mig() < V2F_EPS {
                NodeStatus::On
            } else if calc.lb() > 0.0 {
                NodeStatus::Gt
            } else {
                NodeStatus::In
            };
        }

        let mut cnt = 0;
        for s in 0..self.nodes.len() {
            match self.nodes[s].status {
                NodeStatus::On => {
                    insert_sorted(&mut self.nodes[s].vtx, id_vertex);
                    continue;
                }
                NodeStatus::Gt => {}
                _ => continue,
            }
            let fid = self.nodes[s].id;
            if self.nodes[s].links.is_empty() {
                // one-dimensional hull: push the bound to the new vertex
                self.nodes[s].vtx = vec![id_vertex];
                let row = self.facets.get(fid).expect("hull facet is live").row().clone();
                self.facets.change_rhs(fid, vertex.dot_row(&row).ub());
                continue;
            }
            // out of the collection first: a son may take over its row
            let out = self.facets.get(fid).expect("hull facet is live").to_owned();
            self.facets.remove_by_id(fid);
            let links = self.nodes[s].links.clone();
            for l in links {
                match self.nodes[l].status {
                    NodeStatus::On => self.nodes[l].remove_lnk(s),
                    NodeStatus::In => {
                        self.add_facet_son(s, out.as_ref(), l, id_vertex);
                        cnt += 1;
                    }
                    _ => {}
                }
            }
            self.nodes[s].status = NodeStatus::Rem;
        }

        let candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|&s| matches!(self.nodes[s].status, NodeStatus::On | NodeStatus::New))
            .collect();
        let pairs = (0..candidates.len()).flat_map(|i| {
            let (nodes, candidates) = (&self.nodes, &candidates);
            (i + 1..candidates.len()).map(move |j| {
                let (a, b) = (candidates[i], candidates[j]);
                PairMaxSets::new(a, b, &nodes[a].vtx, &nodes[b].vtx, None)
            })
        });
        for pm in maximal_pairs(pairs) {
            self.nodes[pm.a].add_lnk(pm.b);
            self.nodes[pm.b].add_lnk(pm.a);
        }
        let removed = self.compact();
        tracing::debug!(vertex = id_vertex, created = cnt, removed, facets = self.nodes.len(), "vertex inserted");
        cnt
    }

    /// Handle the equalities: a vertex off the flat turns the first
    /// violated equality into inequalities and tilts the other equalities
    /// (and the existing facets) through the vertex. `None` when the vertex
    /// lies on the flat.
    fn absorb_equalities(&mut self, id_vertex: usize, vertex: &IntervalVector) -> Option<usize> {
        let mut violated: Option<(usize, Interval)> = None;
        for i in (0..self.facets.nb_eq_facets()).rev() {
            if i >= self.facets.nb_eq_facets() {
                continue;
            }
            let f = self.facets.eq_facet(i);
            let calc = vertex.dot_row(f.row()) - f.rhs();
            if calc.mig() < V2F_EPS {
                continue;
            }
            match violated {
                None => violated = Some((f.id(), calc)),
                Some((vid, delta)) => {
                    let c = -(calc / delta).mid();
                    let (row, rhs) = (f.row().clone(), f.rhs());
                    let v = self.facets.get(vid).expect("violated equality is live");
                    let nrow = row + v.row() * c;
                    let nrhs = rhs + c * v.rhs();
                    self.facets.change_eq_facet(i, nrow, nrhs, DuplicateAction::KeepRhs);
                }
            }
        }
        let (vid, delta) = violated?;
        let k = self.facets.eq_position(vid).expect("violated equality is still an equality");
        let (save_row, save_rhs) = {
            let v = self.facets.get(vid).expect("violated equality is live");
            (v.row().clone(), v.rhs())
        };

        if self.nodes.is_empty() {
            let dot = vertex.dot_row(&save_row);
            let nrhs = if delta.lb() > 0.0 { dot.ub() } else { dot.lb() };
            let new_id = self
                .facets
                .dissociate_eq_facet(k, nrhs, DuplicateAction::KeepRhs)
                .expect("no inequality duplicates a split equality");
            let (a_id, b_id) = if delta.lb() > 0.0 { (vid, new_id) } else { (new_id, vid) };
            self.nodes.push(DdFacet::new(a_id, Vec::new(), vec![id_vertex]));
            self.nodes.push(DdFacet::new(b_id, vec![0], self.id_vertices.clone()));
            self.nodes[0].add_lnk(1);
            return Some(2);
        }

        let all: Vec<usize> = (0..self.nodes.len()).collect();
        for n in self.nodes.iter_mut() {
            n.status = NodeStatus::Gt;
        }
        let nbound = if delta.lb() > 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        let u = self
            .facets
            .dissociate_eq_facet(k, nbound, DuplicateAction::KeepRhs)
            .map(|fid| {
                self.nodes.push(DdFacet::new(fid, all.clone(), self.id_vertices.clone()));
                self.nodes.len() - 1
            });
        for s in all {
            let fid = self.nodes[s].id;
            let (row, rhs) = {
                let f = self.facets.get(fid).expect("hull facet is live");
                (f.row().clone(), f.rhs())
            };
            let q = Interval::point(rhs) - vertex.dot_row(&row);
            let c = (q / delta).mid();
            if let Some(u) = u {
                self.nodes[s].add_lnk(u);
            }
            insert_sorted(&mut self.nodes[s].vtx, id_vertex);
            match self.facets.change_ineq_facet(fid, row + &save_row * c, rhs + c * save_rhs, DuplicateAction::KeepRhs) {
                Rekey::Moved(_) => {}
                Rekey::Merged { id, .. } => self.nodes[s].id = id,
                Rekey::Dropped => self.remove_node(s),
            }
        }
        self.compact();
        Some(usize::from(u.is_some()))
    }

    /// New facet through the intersection of `out` (violated by the new
    /// vertex, already removed from the collection) and its inside
    /// neighbour `inside`.
    fn add_facet_son(&mut self, out: usize, f1: FacetRef<'_>, inside: usize, id_vertex: usize) -> Option<usize> {
        let (l1, l2) = (self.nodes[out].lambda, self.nodes[inside].lambda);
        let f2 = self.facets.get(self.nodes[inside].id).expect("hull facet is live");
        let mut row = f1.row() * -l2 + f2.row() * l1;
        let mut rhs = -l2 * f1.rhs() + l1 * f2.rhs();
        reduce_row(&mut row, &mut rhs);

        let mut vtx = sorted_intersection(&self.nodes[out].vtx, &self.nodes[inside].vtx);
        insert_sorted(&mut vtx, id_vertex);
        match self.facets.insert(row, rhs, false, DuplicateAction::KeepRhs) {
            Insertion::New(fid) => {
                self.nodes.push(DdFacet::new(fid, vec![inside], vtx));
                let slot = self.nodes.len() - 1;
                self.nodes[inside].change_lnk(out, slot);
                Some(slot)
            }
            _ => {
                self.nodes[inside].remove_lnk(out);
                None
            }
        }
    }

    fn remove_node(&mut self, s: usize) {
        let links = std::mem::take(&mut self.nodes[s].links);
        for l in links {
            self.nodes[l].remove_lnk(s);
        }
        self.nodes[s].status = NodeStatus::Rem;
    }

    fn compact(&mut self) -> usize {
        let mut map = vec![None; self.nodes.len()];
        let mut k = 0;
        for (s, n) in self.nodes.iter().enumerate() {
            if n.status != NodeStatus::Rem {
                map[s] = Some(k);
                k += 1;
            }
        }
        let removed = self.nodes.len() - k;
        self.nodes.retain(|n| n.status != NodeStatus::Rem);
        for n in self.nodes.iter_mut() {
            n.links = n.links.iter().filter_map(|&l| map[l]).collect();
            n.status = NodeStatus::In;
        }
        removed
    }
}

impl fmt::Display for DdBuildV2F {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DDbuildV2F ({} eq, {} total fcts) :",
            self.facets.nb_eq_facets(),
            self.facets.nb_facets()
        )?;
        for k in 0..self.facets.nb_eq_facets() {
            writeln!(f, "{}", self.facets.eq_facet(k))?;
        }
        for n in &self.nodes {
            if let Some(fc) = self.facets.get(n.id) {
                writeln!(f, "{fc}")?;
            }
            let lnks: Vec<usize> = n.links.iter().map(|&l| self.nodes[l].id).collect();
            writeln!(f, " vtx: {:?}", n.vtx)?;
            writeln!(f, " lnks: {lnks:?}")?;
        }
        writeln!(f, "endDDbuildV2F")
    }
}
