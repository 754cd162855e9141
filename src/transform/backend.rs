//! Transform backend interface — spin-weighted harmonic ⇄ real-space maps.
//!
//! Purpose
//! -------
//! Define the seam between the estimator algebra and the numerical
//! primitives that move a harmonic sequence to real space on quadrature
//! nodes and back. Backends only need to supply the Wigner small-d column
//! `d^l_{m,m'}(x)` for `l = 0..=lmax`; the forward and reverse transforms
//! are shared default methods so that every backend agrees on
//! normalization.
//!
//! Key behaviors
//! -------------
//! - [`TransformBackend::to_real_space`]:
//!   `ξ(x_i) = Σ_l (2l+1)/(4π) · c_l · d^l_{s_in,s_out}(x_i)`.
//! - [`TransformBackend::project_to_harmonic`]:
//!   `h_L = 2π Σ_i f_i · d^L_{s_in,s_out}(x_i)`, where `f_i` already carries
//!   the quadrature weights.
//! - [`BackendKind`] selects one of the two shipped backends by name.
//!
//! Conventions
//! -----------
//! - `d^l_{m,m'}(β) = <l m| exp(−iβJ_y) |l m'>`, so `d^1_{1,0} = −sin β/√2`.
//! - `d^l_{m,m'} = 0` for `l < max(|m|, |m'|)`.
use crate::transform::{
    errors::{TransformError, TransformResult},
    quadrature::{QuadratureRule, gauss_legendre},
    wigner::{JacobiReference, WignerRecurrence},
};
use ndarray::{Array1, ArrayView1};
use std::f64::consts::PI;
use std::str::FromStr;

/// Spin-weighted transform primitives on Gauss–Legendre nodes.
///
/// Required:
/// - `name()`: short identifier used in diagnostics.
/// - `wigner_d(lmax, x, m, mp, out)`: fill `out[0..=lmax]` with
///   `d^l_{m,mp}(x)`.
///
/// Provided:
/// - `quadrature_nodes`, `to_real_space`, `project_to_harmonic`.
pub trait TransformBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn wigner_d(&self, lmax: usize, x: f64, m: i32, mp: i32, out: &mut [f64]);

    /// Node positions and weights of the `n`-point Gauss–Legendre rule.
    fn quadrature_nodes(&self, n: usize) -> TransformResult<QuadratureRule> {
        gauss_legendre(n)
    }

    /// Map harmonic coefficients `cl` to real-space values at `nodes`.
    ///
    /// # Errors
    /// - [`TransformError::NonFiniteOutput`] if any value is NaN/±inf.
    fn to_real_space(
        &self, cl: ArrayView1<f64>, nodes: ArrayView1<f64>, spin_in: i32, spin_out: i32,
    ) -> TransformResult<Array1<f64>> {
        let mut out = Array1::<f64>::zeros(nodes.len());
        if cl.is_empty() {
            return Ok(out);
        }
        let lmax = cl.len() - 1;
        let coeffs: Vec<f64> = cl
            .iter()
            .enumerate()
            .map(|(l, &c)| (2.0 * l as f64 + 1.0) / (4.0 * PI) * c)
            .collect();
        let mut column = vec![0.0; lmax + 1];
        for (i, &x) in nodes.iter().enumerate() {
            self.wigner_d(lmax, x, spin_in, spin_out, &mut column);
            let value: f64 = coeffs.iter().zip(column.iter()).map(|(c, d)| c * d).sum();
            if !value.is_finite() {
                return Err(TransformError::NonFiniteOutput { backend: self.name(), index: i });
            }
            out[i] = value;
        }
        Ok(out)
    }

    /// Project weighted real-space values onto `d^L_{spin_in,spin_out}`,
    /// `L = 0..=lmax_out`.
    ///
    /// # Errors
    /// - [`TransformError::LengthMismatch`] if `values` and `nodes` differ in length.
    /// - [`TransformError::NonFiniteOutput`] if any coefficient is NaN/±inf.
    fn project_to_harmonic(
        &self, values: ArrayView1<f64>, nodes: ArrayView1<f64>, spin_in: i32, spin_out: i32,
        lmax_out: usize,
    ) -> TransformResult<Array1<f64>> {
        if values.len() != nodes.len() {
            return Err(TransformError::LengthMismatch {
                expected: nodes.len(),
                actual: values.len(),
            });
        }
        let mut out = Array1::<f64>::zeros(lmax_out + 1);
        let mut column = vec![0.0; lmax_out + 1];
        for (&x, &v) in nodes.iter().zip(values.iter()) {
            self.wigner_d(lmax_out, x, spin_in, spin_out, &mut column);
            for (o, d) in out.iter_mut().zip(column.iter()) {
                *o += 2.0 * PI * d * v;
            }
        }
        if let Some(index) = out.iter().position(|v| !v.is_finite()) {
            return Err(TransformError::NonFiniteOutput { backend: self.name(), index });
        }
        Ok(out)
    }
}

/// Choice of transform backend.
///
/// Variants:
/// - `Recurrence`: three-term recurrence in `l` (fast, default).
/// - `Jacobi`: closed form through Jacobi polynomials, degree by degree
///   (reference).
///
/// Parsing is case-insensitive (`"recurrence"`, `"jacobi"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Recurrence,
    Jacobi,
}

impl BackendKind {
    /// Instantiate the selected backend.
    pub fn build(self) -> Box<dyn TransformBackend> {
        match self {
            BackendKind::Recurrence => Box::new(WignerRecurrence),
            BackendKind::Jacobi => Box::new(JacobiReference),
        }
    }
}

impl FromStr for BackendKind {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recurrence" => Ok(BackendKind::Recurrence),
            "jacobi" => Ok(BackendKind::Jacobi),
            _ => Err(TransformError::InvalidBackend {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'recurrence' or 'jacobi'.",
            }),
        }
    }
}
