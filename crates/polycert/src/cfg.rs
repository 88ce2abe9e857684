//! Tolerance defaults and LP configuration.
//!
//! Policy
//! - Geometric tolerances are fixed constants; they only decide how
//!   floating-point ties are classified, never what is certified.
//! - The LP layer carries a small `LpCfg` (budget + tolerance) because callers
//!   legitimately trade speed against certification strength there.

use std::time::Duration;

/// Band under which a vertex is considered on a new facet during F2V.
pub(crate) const F2V_EPS: f64 = 1e-9;
/// Band under which a facet is considered through a new vertex during V2F.
pub(crate) const V2F_EPS: f64 = 1e-8;
/// Relative slack under which a row counts as tight when rebuilding an LP basis.
pub(crate) const TIGHT_EPS: f64 = 1e-7;
/// Relative gap between a certified LP bound and the solver optimum above
/// which the bound is considered loose.
pub(crate) const GAP_EPS: f64 = 1e-7;
/// Slack under which a row maximized with itself switched off still counts
/// as implied by the other constraints.
pub(crate) const IMPLIED_EPS: f64 = 1e-8;
/// Pivot threshold for rank decisions in pivoted elimination.
pub(crate) const PIVOT_EPS: f64 = 1e-12;
/// Relative residual norm under which a candidate row is dependent on an
/// LP basis under construction.
pub(crate) const RANK_EPS: f64 = 1e-9;
/// Exponent range kept by power-of-two rescaling of DD rows and vertices.
pub(crate) const REDUCE_EXP: i32 = 10;

/// Certified LP configuration.
///
/// `timeout` and `max_iterations` bound the work of one `LpClp::solve`:
/// a solver call exceeding `timeout` is reported as `ERROR_LPCOIN`, and the
/// primal nudging performed during certification stops after
/// `max_iterations` rounds.
#[derive(Clone, Copy, Debug)]
pub struct LpCfg {
    pub timeout: Duration,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for LpCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            max_iterations: 200,
            tolerance: 1e-9,
        }
    }
}
