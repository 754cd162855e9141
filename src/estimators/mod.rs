//! estimators — quadratic-estimator definitions and spin-space algebra.
//!
//! Purpose
//! -------
//! Describe which quadratic statistic is being built and how spin-weighted
//! fields couple: keys, spectrum/filter sets, legs, coupling sequences,
//! response legs and estimator weights. No transforms happen here; the
//! `response` module feeds these pieces to the convolution kernel.
//!
//! Key behaviors
//! -------------
//! - [`EstimatorKey`] / [`SourceKey`] resolve string codes once.
//! - [`Spectra`] / [`Filters`] hold immutable per-channel sequences.
//! - [`coupling`], [`raise_response`], [`lower_response`],
//!   [`response_legs`] and [`covariance_response`] implement the spin
//!   algebra.
//! - [`estimator_weights`] enumerates the [`QuadraticTerm`]s of a key.
//!
//! Invariants & assumptions
//! ------------------------
//! - Spins are in `{0, −2, 2}` wherever spectra are coupled.
//! - Failures are reported via [`EstimatorResult`].

pub mod coupling;
pub mod errors;
pub mod keys;
pub mod legs;
pub mod spectra;
pub mod weights;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::coupling::{
    ResponseLeg, coupling, covariance_response, lower_response, raise_response, response_legs,
};
pub use self::errors::{EstimatorError, EstimatorResult};
pub use self::keys::{EstimatorFamily, EstimatorKey, SourceKey};
pub use self::legs::{QeLeg, QuadraticTerm};
pub use self::spectra::{FilterChannel, Filters, Spectra, SpectrumChannel};
pub use self::weights::estimator_weights;
