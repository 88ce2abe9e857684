//! Face decomposition of a low-dimensional F2V build, for plotting.
//!
//! Faces are walked along the adjacency links of the vertices, using the
//! midpoints of the vertex enclosures. A ray met during a walk is cut at
//! `bound` along its direction from the previous point, so unbounded
//! faces come out truncated rather than exact.

use crate::dd::{DdBuildF2V, FacetCode};
use crate::Vector;

/// Walk the vertices lying on `code` (any vertex when `None`), starting from
/// a finite one. Returns the points in walking order.
fn walk_face(build: &DdBuildF2V, code: Option<FacetCode>, bound: f64) -> Vec<Vector> {
    let vertices = build.vertices();
    let codes = build.codes();
    let on_face = |slot: usize| match code {
        None => true,
        Some(c) => vertices[slot].facet_codes().iter().any(|&k| codes[k] == c),
    };
    let Some(start) = (0..vertices.len()).find(|&s| !vertices[s].is_ray() && on_face(s)) else {
        return Vec::new();
    };
    let mut used = vec![start];
    let mut current = build.compute_vertex(vertices[start].homogeneous()).mid();
    let mut out = vec![current.clone()];
    let mut slot = start;
    while let Some(&next) = vertices[slot]
        .links()
        .iter()
        .find(|&&l| on_face(l) && !used.contains(&l))
    {
        let p = build.compute_vertex(vertices[next].homogeneous()).mid();
        current = if vertices[next].is_ray() { &current + &(p * bound) } else { p };
        out.push(current.clone());
        used.push(next);
        slot = next;
    }
    out
}

/// Faces of a 3-dimensional build, each as a cycle of points. A build of
/// lower flat dimension gives a single face.
pub fn build_3d_facets(build: &DdBuildF2V, bound: f64) -> Vec<Vec<Vector>> {
    assert_eq!(build.dim(), 3, "3d decomposition of a {}-dimensional build", build.dim());
    if build.is_empty() {
        return Vec::new();
    }
    if build.fdim() < 3 {
        let face = walk_face(build, None, bound);
        return if face.is_empty() { Vec::new() } else { vec![face] };
    }
    let mut seen: Vec<FacetCode> = build
        .codes()
        .iter()
        .copied()
        .filter(|c| !matches!(c, FacetCode::Infinity | FacetCode::Dropped))
        .collect();
    seen.sort_unstable();
    seen.dedup();
    seen.into_iter()
        .map(|c| walk_face(build, Some(c), bound))
        .filter(|face| face.len() >= 3)
        .collect()
}

/// Boundary of a 2-dimensional build as a cycle of points.
pub fn build_2d_facet(build: &DdBuildF2V, bound: f64) -> Vec<Vector> {
    assert_eq!(build.dim(), 2, "2d decomposition of a {}-dimensional build", build.dim());
    if build.is_empty() {
        return Vec::new();
    }
    walk_face(build, None, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::CollectFacets;
    use crate::interval::{Interval, IntervalVector};

    #[test]
    fn cube_has_six_square_faces() {
        let bbox = IntervalVector::constant(3, Interval::new(0.0, 1.0));
        let dd = DdBuildF2V::new(3, &bbox, &CollectFacets::new(3), true);
        let faces = build_3d_facets(&dd, 50.0);
        assert_eq!(faces.len(), 6);
        for f in &faces {
            assert_eq!(f.len(), 4);
        }
    }

    #[test]
    fn square_boundary_is_a_cycle() {
        let bbox = IntervalVector::constant(2, Interval::new(-1.0, 1.0));
        let dd = DdBuildF2V::new(2, &bbox, &CollectFacets::new(2), true);
        let face = build_2d_facet(&dd, 50.0);
        assert_eq!(face.len(), 4);
        // consecutive corners differ in one coordinate
        for k in 0..4 {
            let d = &face[(k + 1) % 4] - &face[k];
            assert_eq!(d.iter().filter(|x| x.abs() > 1e-12).count(), 1);
        }
    }
}
