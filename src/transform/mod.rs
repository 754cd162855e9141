//! transform — spin-weighted harmonic transforms and the convolution kernel.
//!
//! Purpose
//! -------
//! Provide the numerical core shared by all response and noise calculations:
//! Gauss–Legendre nodes, Wigner small-d evaluation, forward/reverse
//! spin-weighted transforms and the product-of-correlations kernel
//! [`ConvolutionKernel::get_hl`].
//!
//! Key behaviors
//! -------------
//! - [`TransformBackend`] is the injectable seam; two implementations ship:
//!   [`WignerRecurrence`] (fast) and [`JacobiReference`] (reference).
//! - [`BackendKind`] picks one by name for configuration layers.
//! - [`ConvolutionKernel`] owns a backend together with its per-`N` node
//!   table.
//!
//! Conventions
//! -----------
//! - Harmonic sequences are indexed by degree `l = 0..=lmax`.
//! - `x = cos θ ∈ [-1, 1]`; nodes ascend.
//! - Errors are reported via [`TransformResult`]; nothing here panics on
//!   user input.
//!
//! Testing notes
//! -------------
//! - Quadrature exactness, backend agreement, forward/reverse identity and
//!   `get_hl` regression values are covered by unit tests in the
//!   submodules.

pub mod backend;
pub mod errors;
pub mod kernel;
pub mod quadrature;
pub mod wigner;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::backend::{BackendKind, TransformBackend};
pub use self::errors::{TransformError, TransformResult};
pub use self::kernel::ConvolutionKernel;
pub use self::quadrature::{QuadratureRule, gauss_legendre};
pub use self::wigner::{JacobiReference, WignerRecurrence};
