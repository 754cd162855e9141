//! Convolution kernel — Legendre coefficients of spin-weighted products.
//!
//! Purpose
//! -------
//! Compute `h_L`, the harmonic coefficients of the real-space product
//! `ξ_{sp1,s1}(x) · ξ_{sp2,s2}(x)` of two spin-weighted correlation
//! functions, given their harmonic sequences. This is the single numerical
//! primitive every response and noise calculation reduces to.
//!
//! Key behaviors
//! -------------
//! - The integrand is a polynomial of degree `≤ lmax1 + lmax2 + lmax_out`
//!   in `x = cos θ`, so Gauss–Legendre on
//!   `N = (T + 2 − T mod 2) / 2` nodes (`T` that total degree) is exact.
//! - Node tables are memoized per `N` inside the kernel and never
//!   invalidated; they are pure functions of `N`.
//! - The output spin pair is `(sp1 + sp2, s1 + s2)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Default `lmax_out = lmax1 + lmax2`.
//! - An empty input sequence yields a zero output of length `lmax_out + 1`.
//! - The node table is guarded by a `Mutex`, so a kernel can be shared by
//!   reference across threads; computations themselves are synchronous.
use crate::transform::{
    backend::{BackendKind, TransformBackend},
    errors::TransformResult,
    quadrature::QuadratureRule,
};
use ndarray::{Array1, ArrayView1};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Owner of a transform backend and its quadrature node table.
pub struct ConvolutionKernel {
    backend: Box<dyn TransformBackend>,
    rules: Mutex<HashMap<usize, Arc<QuadratureRule>>>,
}

impl ConvolutionKernel {
    /// Kernel over one of the shipped backends.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_backend(kind.build())
    }

    /// Kernel over a caller-supplied backend.
    pub fn with_backend(backend: Box<dyn TransformBackend>) -> Self {
        ConvolutionKernel { backend, rules: Mutex::new(HashMap::new()) }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of node tables built so far.
    pub fn cached_rules(&self) -> usize {
        self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Legendre coefficients of `ξ_{sp1,s1} · ξ_{sp2,s2}` up to `lmax_out`.
    ///
    /// Parameters
    /// ----------
    /// - `cl1`, `cl2`: harmonic sequences of the two factors.
    /// - `sp1`, `s1`: spin pair of the first factor.
    /// - `sp2`, `s2`: spin pair of the second factor.
    /// - `lmax_out`: output max degree, defaults to `lmax1 + lmax2`.
    ///
    /// Returns
    /// -------
    /// Sequence of length `lmax_out + 1` at output spins
    /// `(sp1 + sp2, s1 + s2)`.
    ///
    /// Errors
    /// ------
    /// Propagates backend failures ([`crate::transform::TransformError`]).
    #[allow(clippy::too_many_arguments)]
    pub fn get_hl(
        &self, cl1: ArrayView1<f64>, cl2: ArrayView1<f64>, sp1: i32, s1: i32, sp2: i32, s2: i32,
        lmax_out: Option<usize>,
    ) -> TransformResult<Array1<f64>> {
        if cl1.is_empty() || cl2.is_empty() {
            return Ok(Array1::zeros(lmax_out.unwrap_or(0) + 1));
        }
        let lmax1 = cl1.len() - 1;
        let lmax2 = cl2.len() - 1;
        let lmax_out = lmax_out.unwrap_or(lmax1 + lmax2);
        let total = lmax1 + lmax2 + lmax_out;
        let n = (total + 2 - total % 2) / 2;
        let rule = self.rule(n)?;

        let xi1 = self.backend.to_real_space(cl1, rule.nodes.view(), sp1, s1)?;
        let xi2 = self.backend.to_real_space(cl2, rule.nodes.view(), sp2, s2)?;
        let integrand = &xi1 * &xi2 * &rule.weights;
        self.backend.project_to_harmonic(
            integrand.view(),
            rule.nodes.view(),
            sp1 + sp2,
            s1 + s2,
            lmax_out,
        )
    }

    fn rule(&self, n: usize) -> TransformResult<Arc<QuadratureRule>> {
        let mut rules = self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(rule) = rules.get(&n) {
            return Ok(Arc::clone(rule));
        }
        debug!(nodes = n, backend = self.backend.name(), "building Gauss-Legendre node table");
        let rule = Arc::new(self.backend.quadrature_nodes(n)?);
        rules.insert(n, Arc::clone(&rule));
        Ok(rule)
    }
}

impl Default for ConvolutionKernel {
    fn default() -> Self {
        ConvolutionKernel::new(BackendKind::default())
    }
}

impl std::fmt::Debug for ConvolutionKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionKernel")
            .field("backend", &self.backend.name())
            .field("cached_rules", &self.cached_rules())
            .finish()
    }
}
