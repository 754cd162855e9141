//! Errors for estimator definitions and the response/noise assemblers.
//!
//! [`EstimatorError`] covers configuration failures (unknown keys, spins
//! outside `{0, ±2}`), missing spectrum or filter channels, unsupported
//! inputs and wrapped transform failures. The alias [`EstimatorResult`] is
//! shared by `estimators` and `response`.
//!
//! ## Conventions
//! - Configuration errors are fatal and surface at the call that detects
//!   them; no default is substituted.
//! - A provably-zero cross term is not an error and never reaches this type.
use crate::transform::errors::TransformError;

pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Unified error type for estimator algebra and assemblers.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    // ---- Configuration ----
    /// Estimator key outside the supported set.
    UnknownEstimator { key: String },

    /// Anisotropy source key outside the supported set.
    UnknownSource { key: String },

    /// Source has no field-response legs (point sources act on the covariance only).
    NoResponseLegs { source: &'static str },

    /// Spin outside `{0, -2, 2}`.
    InvalidSpin { spin: i32 },

    // ---- Inputs ----
    /// Spectrum or filter channel required by the requested algebra is absent.
    MissingChannel { channel: &'static str },

    /// Sequence is shorter than the degree range it must cover.
    SequenceTooShort { channel: &'static str, required: usize, actual: usize },

    /// Quadratic term with negative total output spin.
    NonCanonicalTerm { spin_out_a: i32, spin_out_b: i32 },

    /// Representable but unsupported input (e.g. non-zero B weights).
    NotImplemented { reason: &'static str },

    /// Mean-field response requested for an unsupported estimator.
    UnsupportedMeanField { key: &'static str },

    // ---- Transform ----
    Transform(TransformError),
}

impl std::error::Error for EstimatorError {}

impl From<TransformError> for EstimatorError {
    fn from(err: TransformError) -> Self {
        EstimatorError::Transform(err)
    }
}

impl std::fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            EstimatorError::UnknownEstimator { key } => {
                write!(f, "Estimator Error: estimator '{key}' not implemented")
            }
            EstimatorError::UnknownSource { key } => {
                write!(f, "Estimator Error: anisotropy source '{key}' not implemented")
            }
            EstimatorError::NoResponseLegs { source } => {
                write!(f, "Estimator Error: source '{source}' has no response legs")
            }
            EstimatorError::InvalidSpin { spin } => {
                write!(f, "Estimator Error: spin {spin} not in {{0, -2, 2}}")
            }

            // ---- Inputs ----
            EstimatorError::MissingChannel { channel } => {
                write!(f, "Estimator Error: missing channel '{channel}'")
            }
            EstimatorError::SequenceTooShort { channel, required, actual } => write!(
                f,
                "Estimator Error: channel '{channel}' needs at least {required} entries, \
                 got {actual}"
            ),
            EstimatorError::NonCanonicalTerm { spin_out_a, spin_out_b } => write!(
                f,
                "Estimator Error: quadratic term output spins ({spin_out_a}, {spin_out_b}) \
                 sum below zero"
            ),
            EstimatorError::NotImplemented { reason } => {
                write!(f, "Estimator Error: not implemented: {reason}")
            }
            EstimatorError::UnsupportedMeanField { key } => {
                write!(f, "Estimator Error: mean-field response not available for '{key}'")
            }

            // ---- Transform ----
            EstimatorError::Transform(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<EstimatorError> for pyo3::PyErr {
    fn from(err: EstimatorError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
