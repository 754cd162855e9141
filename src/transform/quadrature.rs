//! Gauss–Legendre quadrature on `[-1, 1]`.
//!
//! Purpose
//! -------
//! Provide the node positions and weights used by the convolution kernel to
//! integrate products of spin-weighted correlation functions exactly. An
//! `N`-point rule integrates any polynomial of degree `≤ 2N − 1` in
//! `x = cos θ` without error (up to floating-point rounding).
//!
//! Key behaviors
//! -------------
//! - [`gauss_legendre`] computes the roots of `P_N` by Newton iteration from
//!   the classical Chebyshev-like initial guess, exploiting the symmetry of
//!   the roots so that only half of them are iterated.
//! - Weights follow `w_i = 2 / ((1 − x_i²) P_N'(x_i)²)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Nodes are returned in ascending order and lie strictly inside
//!   `(-1, 1)`; weights are strictly positive and sum to 2.
//! - Rules are pure functions of `N`; callers may cache them indefinitely.
use crate::transform::errors::{TransformError, TransformResult};
use ndarray::Array1;

/// Maximum number of Newton steps per root.
const MAX_NEWTON_ITER: usize = 100;

/// Newton step size below which a root is accepted.
const NEWTON_TOL: f64 = 3.0 * f64::EPSILON;

/// Looser acceptance used when the iteration stalls at rounding level.
const NEWTON_STALL_TOL: f64 = 1e-12;

/// Gauss–Legendre rule: node positions `x_i = cos θ_i` and weights `w_i`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    pub nodes: Array1<f64>,
    pub weights: Array1<f64>,
}

impl QuadratureRule {
    /// Number of nodes `N`.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Compute the `n`-point Gauss–Legendre rule on `[-1, 1]`.
///
/// # Errors
/// - [`TransformError::InvalidNodeCount`] if `n == 0`.
/// - [`TransformError::QuadratureNotConverged`] if a root fails to settle.
pub fn gauss_legendre(n: usize) -> TransformResult<QuadratureRule> {
    if n == 0 {
        return Err(TransformError::InvalidNodeCount { n });
    }
    let mut nodes = Array1::<f64>::zeros(n);
    let mut weights = Array1::<f64>::zeros(n);
    let n_f = n as f64;

    for i in 0..n.div_ceil(2) {
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n_f + 0.5)).cos();
        let mut dp = 0.0;
        let mut step = f64::INFINITY;
        for _ in 0..MAX_NEWTON_ITER {
            let (p, dp_z) = legendre_with_derivative(n, z);
            dp = dp_z;
            step = p / dp;
            z -= step;
            if step.abs() <= NEWTON_TOL {
                break;
            }
        }
        if step.abs() > NEWTON_STALL_TOL {
            return Err(TransformError::QuadratureNotConverged { n, index: i });
        }
        // Refresh the derivative at the accepted root.
        let (_, dp_final) = legendre_with_derivative(n, z);
        if dp_final.is_finite() {
            dp = dp_final;
        }
        let w = 2.0 / ((1.0 - z * z) * dp * dp);
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    Ok(QuadratureRule { nodes, weights })
}

/// Evaluate `P_n(z)` and `P_n'(z)` by the Bonnet recurrence.
fn legendre_with_derivative(n: usize, z: f64) -> (f64, f64) {
    let mut p1 = 1.0;
    let mut p2 = 0.0;
    for j in 1..=n {
        let p3 = p2;
        p2 = p1;
        let j_f = j as f64;
        p1 = ((2.0 * j_f - 1.0) * z * p2 - (j_f - 1.0) * p3) / j_f;
    }
    let dp = n as f64 * (z * p1 - p2) / (z * z - 1.0);
    (p1, dp)
}
