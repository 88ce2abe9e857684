//! Seeded random point clouds and H-representations.
//!
//! Purpose
//! - Reproducible inputs for property tests and benchmarks of the double
//!   description and the certified LP.
//!
//! Why this design
//! - Every sample is a pure function of its params and a `u64` seed; a
//!   `HalfspaceGenerator` streams seeds from a master RNG and `regenerate`
//!   replays any sample from its seed.
//! - Halfspaces come in centrally symmetric pairs around the origin and
//!   are closed by a box, so every sample is bounded and contains `0`.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;

use crate::interval::{Interval, IntervalVector};
use crate::polytope::Polytope;
use crate::Vector;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid generator params: {reason}")]
    InvalidParams { reason: String },
}

fn invalid(reason: &str) -> GeneratorError {
    GeneratorError::InvalidParams { reason: reason.to_string() }
}

/// Uniform direction on the unit sphere of `ℝⁿ` (rejection from the cube).
pub fn sample_unit_vector(rng: &mut StdRng, dim: usize) -> Vector {
    loop {
        let v = Vector::from_fn(dim, |_, _| rng.gen_range(-1.0..=1.0));
        let n = v.norm();
        if n > 1e-6 && n <= 1.0 {
            return v / n;
        }
    }
}

/// `count` points on the sphere of radius `radius` around the origin.
pub fn sphere_cloud(dim: usize, count: usize, radius: f64, seed: u64) -> Result<Vec<Vector>, GeneratorError> {
    if dim == 0 {
        return Err(invalid("dimension must be positive"));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(invalid("radius must be finite and > 0"));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count).map(|_| sample_unit_vector(&mut rng, dim) * radius).collect())
}

/// `count` points drawn uniformly in a bounded box.
pub fn box_cloud(bbox: &IntervalVector, count: usize, seed: u64) -> Result<Vec<Vector>, GeneratorError> {
    if bbox.is_empty() || bbox.is_unbounded() {
        return Err(invalid("box must be bounded and non-empty"));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count)
        .map(|_| Vector::from_fn(bbox.size(), |i, _| bbox[i].lb() + bbox[i].diam() * rng.gen::<f64>()))
        .collect())
}

/// Parameters of centrally symmetric random halfspaces.
#[derive(Clone, Debug, PartialEq)]
pub struct HalfspaceParams {
    pub dim: usize,
    /// Number of `±u·x ≤ r` pairs.
    pub directions: usize,
    pub radius_min: f64,
    pub radius_max: f64,
}

impl HalfspaceParams {
    fn validate(&self) -> Result<(), GeneratorError> {
        if self.dim == 0 {
            return Err(invalid("dimension must be positive"));
        }
        if !(self.radius_min.is_finite() && self.radius_max.is_finite()) {
            return Err(invalid("radius bounds must be finite"));
        }
        if self.radius_min <= 0.0 {
            return Err(invalid("radius_min must be > 0"));
        }
        if self.radius_min > self.radius_max {
            return Err(invalid("radius_min <= radius_max required"));
        }
        Ok(())
    }
}

/// A bounded H-representation: box plus rows `row·x ≤ rhs`.
#[derive(Clone, Debug)]
pub struct HSample {
    pub bbox: IntervalVector,
    pub rows: Vec<(Vector, f64)>,
    pub seed: u64,
}

impl HSample {
    pub fn to_polytope(&self, minimize: bool) -> Polytope {
        Polytope::from_facets(&self.bbox, &self.rows, minimize)
    }
}

/// Stream of halfspace samples.
pub struct HalfspaceGenerator {
    params: HalfspaceParams,
    master_rng: StdRng,
}

impl HalfspaceGenerator {
    pub fn new(params: HalfspaceParams, seed: u64) -> Result<Self, GeneratorError> {
        params.validate()?;
        Ok(HalfspaceGenerator { params, master_rng: StdRng::seed_from_u64(seed) })
    }

    pub fn params(&self) -> &HalfspaceParams {
        &self.params
    }

    pub fn generate_single(params: &HalfspaceParams, seed: u64) -> Result<HSample, GeneratorError> {
        params.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(2 * params.directions);
        for _ in 0..params.directions {
            let u = sample_unit_vector(&mut rng, params.dim);
            let r = rng.gen_range(params.radius_min..=params.radius_max);
            rows.push((-&u, r));
            rows.push((u, r));
        }
        // the ball of radius_max contains every sample
        let bbox = IntervalVector::constant(params.dim, Interval::pm(params.radius_max));
        Ok(HSample { bbox, rows, seed })
    }

    pub fn generate_next(&mut self) -> Result<HSample, GeneratorError> {
        let seed = self.master_rng.next_u64();
        Self::generate_single(&self.params, seed)
    }

    pub fn regenerate(&self, seed: u64) -> Result<HSample, GeneratorError> {
        Self::generate_single(&self.params, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halfspace_generator_replays() {
        let params = HalfspaceParams { dim: 3, directions: 5, radius_min: 0.5, radius_max: 1.0 };
        let mut gen = HalfspaceGenerator::new(params.clone(), 1234).unwrap();
        let sample = gen.generate_next().unwrap();
        assert_eq!(sample.rows.len(), 10);
        let replayed = gen.regenerate(sample.seed).unwrap();
        assert_eq!(sample.rows, replayed.rows);
        let p = sample.to_polytope(false);
        assert!(!p.is_empty(true));
        assert_eq!(p.contains(&IntervalVector::zeros(3)), crate::interval::BoolInterval::True);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = HalfspaceParams { dim: 2, directions: 1, radius_min: 2.0, radius_max: 1.0 };
        assert!(HalfspaceGenerator::new(params, 0).is_err());
        assert!(sphere_cloud(2, 3, -1.0, 0).is_err());
        assert!(box_cloud(&IntervalVector::entire(2), 3, 0).is_err());
    }

    #[test]
    fn clouds_are_seeded() {
        let a = sphere_cloud(4, 20, 2.0, 9).unwrap();
        assert_eq!(a, sphere_cloud(4, 20, 2.0, 9).unwrap());
        assert!(a.iter().all(|p| (p.norm() - 2.0).abs() < 1e-12));
        let bbox = IntervalVector::constant(2, Interval::new(-1.0, 3.0));
        assert!(box_cloud(&bbox, 50, 1).unwrap().iter().all(|p| bbox.contains(p)));
    }
}
