//! Certified convex polytopes.
//!
//! A polytope is a box intersected with a shared collection of facets. The
//! vertex enumeration (double description) and the certified LP are derived
//! forms built on demand; every answer that claims emptiness, inclusion or
//! a bound is guaranteed despite floating point, through interval
//! arithmetic with outward rounding.
//!
//! Layout
//! - `interval`: intervals, boxes, interval matrices, guaranteed inverses.
//! - `facet`: facets, the ordered `CollectFacets`, box relations.
//! - `dd`: facet→vertex and vertex→facet double description.
//! - `lp`: LP through `minilp` with certified primal/dual/Farkas checks.
//! - `polytope`: the `Polytope` façade and its set operations.
//! - `io`: cdd `.ine`/`.ext` files. `faces`: face cycles for plotting.

pub mod cfg;
pub mod dd;
pub mod faces;
pub mod facet;
pub mod interval;
pub mod io;
pub mod lp;
pub mod polytope;
pub mod rand;
pub mod zonotope;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Vector = nalgebra::DVector<f64>;
pub type Matrix = nalgebra::DMatrix<f64>;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::cfg::LpCfg;
    pub use crate::facet::{CollectFacets, DuplicateAction, Facet, FacetBase, InclRel};
    pub use crate::interval::{BoolInterval, Interval, IntervalMatrix, IntervalVector};
    pub use crate::lp::{LpClp, LpStatus};
    pub use crate::polytope::{Engine, PolState, Polytope, Update};
    pub use crate::zonotope::{Parallelepiped, Zonotope};
    pub use crate::{Matrix, Vector};
}
