//! Quadratic-estimator legs and terms.
//!
//! An estimator is a sum of [`QuadraticTerm`]s. Each term multiplies two
//! filtered fields in real space: leg `a` maps the spin-`spin_in` filtered
//! field to spin `spin_out` with harmonic weights `cl`, and likewise for leg
//! `b`. The product is projected onto the output multipoles and rescaled by
//! `cl_out`.
use crate::estimators::errors::{EstimatorError, EstimatorResult};
use ndarray::Array1;

/// One spin-weighted leg of a quadratic term.
#[derive(Debug, Clone, PartialEq)]
pub struct QeLeg {
    pub spin_in: i32,
    pub spin_out: i32,
    pub cl: Array1<f64>,
}

impl QeLeg {
    pub fn new(spin_in: i32, spin_out: i32, cl: Array1<f64>) -> Self {
        QeLeg { spin_in, spin_out, cl }
    }

    pub fn lmax(&self) -> usize {
        self.cl.len().saturating_sub(1)
    }
}

/// Pair of legs plus the output rescaling `cl_out` (`L = 0..=2 lmax`).
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticTerm {
    pub leg_a: QeLeg,
    pub leg_b: QeLeg,
    pub cl_out: Array1<f64>,
}

impl QuadraticTerm {
    /// Build a term; the output spins must sum to a non-negative value.
    ///
    /// # Errors
    /// - [`EstimatorError::NonCanonicalTerm`] otherwise.
    pub fn new(leg_a: QeLeg, leg_b: QeLeg, cl_out: Array1<f64>) -> EstimatorResult<Self> {
        if leg_a.spin_out + leg_b.spin_out < 0 {
            return Err(EstimatorError::NonCanonicalTerm {
                spin_out_a: leg_a.spin_out,
                spin_out_b: leg_b.spin_out,
            });
        }
        Ok(QuadraticTerm { leg_a, leg_b, cl_out })
    }

    /// Highest output multipole covered by `cl_out`.
    pub fn lmax_out(&self) -> usize {
        self.cl_out.len().saturating_sub(1)
    }
}
