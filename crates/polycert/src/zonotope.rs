//! Zonotopes and parallelepipeds: a center plus a generator matrix, the set
//! `{z + A·v : v ∈ [-1, 1]ᵐ}`.

use crate::interval::{Interval, IntervalMatrix, IntervalVector};
use crate::{Matrix, Vector};

#[derive(Clone, Debug, PartialEq)]
pub struct Zonotope {
    center: Vector,
    generators: Matrix,
}

impl Zonotope {
    pub fn new(center: Vector, generators: Matrix) -> Self {
        assert_eq!(center.len(), generators.nrows(), "generator dimension mismatch");
        Zonotope { center, generators }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.center.len()
    }

    #[inline]
    pub fn nb_generators(&self) -> usize {
        self.generators.ncols()
    }

    pub fn center(&self) -> &Vector {
        &self.center
    }

    /// One generator per column.
    pub fn generators(&self) -> &Matrix {
        &self.generators
    }

    /// Guaranteed enclosure of the set.
    pub fn bbox(&self) -> IntervalVector {
        enclosure(&self.center, &self.generators)
    }

    /// Projection on the listed coordinates.
    pub fn project(&self, indices: &[usize]) -> Zonotope {
        project(&self.center, &self.generators, indices)
    }
}

/// Zonotope with at most `n` generators in dimension `n`.
#[derive(Clone, Debug, PartialEq)]
pub struct Parallelepiped {
    center: Vector,
    generators: Matrix,
}

impl Parallelepiped {
    pub fn new(center: Vector, generators: Matrix) -> Self {
        assert_eq!(center.len(), generators.nrows(), "generator dimension mismatch");
        assert!(
            generators.ncols() <= center.len(),
            "too many generators for a parallelepiped"
        );
        Parallelepiped { center, generators }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.center.len()
    }

    pub fn center(&self) -> &Vector {
        &self.center
    }

    pub fn generators(&self) -> &Matrix {
        &self.generators
    }

    /// Square generator matrix (full-dimensional when invertible).
    pub fn is_square(&self) -> bool {
        self.generators.is_square()
    }

    /// The `2ᵐ` corners `z ± a₁ ± … ± aₘ` (floating point).
    pub fn vertices(&self) -> Vec<Vector> {
        let mut out = vec![self.center.clone()];
        for g in self.generators.column_iter() {
            out = out.into_iter().flat_map(|c| [&c + &g, &c - &g]).collect();
        }
        out
    }

    pub fn bbox(&self) -> IntervalVector {
        enclosure(&self.center, &self.generators)
    }

    pub fn project(&self, indices: &[usize]) -> Zonotope {
        project(&self.center, &self.generators, indices)
    }
}

impl From<Parallelepiped> for Zonotope {
    fn from(p: Parallelepiped) -> Self {
        Zonotope::new(p.center, p.generators)
    }
}

fn enclosure(z: &Vector, a: &Matrix) -> IntervalVector {
    let range = IntervalVector::constant(a.ncols(), Interval::pm(1.0));
    &IntervalVector::from_point(z) + &IntervalMatrix::from_matrix(a).mul_vec(&range)
}

fn project(z: &Vector, a: &Matrix, indices: &[usize]) -> Zonotope {
    assert!(indices.iter().all(|&i| i < z.len()), "index out of range");
    let center = Vector::from_iterator(indices.len(), indices.iter().map(|&i| z[i]));
    let generators = Matrix::from_fn(indices.len(), a.ncols(), |r, c| a[(indices[r], c)]);
    Zonotope::new(center, generators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn parallelepiped_corners_and_box() {
        let p = Parallelepiped::new(dvector![1.0, 0.0], dmatrix![1.0, 0.5; 0.0, 1.0]);
        let v = p.vertices();
        assert_eq!(v.len(), 4);
        assert!(v.contains(&dvector![2.5, 1.0]));
        assert!(v.contains(&dvector![-0.5, -1.0]));
        let b = p.bbox();
        assert_eq!(b[0], Interval::new(-0.5, 2.5));
        assert_eq!(b[1], Interval::new(-1.0, 1.0));
        for c in &v {
            assert!(b.contains(c));
        }
    }

    #[test]
    fn projection_keeps_generators() {
        let z = Zonotope::new(dvector![1.0, 2.0, 3.0], dmatrix![1.0, 0.0; 0.0, 1.0; 1.0, 1.0]);
        let p = z.project(&[2, 0]);
        assert_eq!(p.center(), &dvector![3.0, 1.0]);
        assert_eq!(p.generators(), &dmatrix![1.0, 1.0; 1.0, 0.0]);
        assert_eq!(p.bbox()[0], Interval::new(1.0, 5.0));
    }
}
