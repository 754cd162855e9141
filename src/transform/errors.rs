//! Errors for the spin-weighted transform layer.
//!
//! This module defines `TransformError`, the error type shared by the
//! Gauss–Legendre node generator, the Wigner-d transform backends and the
//! convolution kernel. An alias `TransformResult<T>` standardizes return
//! types across `transform`.

/// Unified error type for transform backends and the convolution kernel.
///
/// Covers quadrature set-up failures, shape mismatches between node and
/// value arrays, and non-finite backend output. Diagnostics surface through
/// `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    // ---- Quadrature ----
    /// Gauss–Legendre rules need at least one node.
    InvalidNodeCount { n: usize },

    /// Newton iteration for a Legendre root did not settle.
    QuadratureNotConverged { n: usize, index: usize },

    // ---- Shapes ----
    /// Node and value arrays disagree in length.
    LengthMismatch { expected: usize, actual: usize },

    // ---- Numerical ----
    /// Backend produced NaN/±inf.
    NonFiniteOutput { backend: &'static str, index: usize },

    /// Backend refused the request (used by injected test backends).
    BackendUnavailable { backend: &'static str, reason: String },

    // ---- Configuration ----
    /// Unknown backend name passed to `BackendKind::from_str`.
    InvalidBackend { name: String, reason: &'static str },
}

pub type TransformResult<T> = Result<T, TransformError>;

impl std::error::Error for TransformError {}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Quadrature ----
            TransformError::InvalidNodeCount { n } => {
                write!(f, "Transform Error: Gauss-Legendre rule needs at least one node, got {n}")
            }
            TransformError::QuadratureNotConverged { n, index } => write!(
                f,
                "Transform Error: Newton iteration for root {index} of P_{n} did not converge"
            ),

            // ---- Shapes ----
            TransformError::LengthMismatch { expected, actual } => {
                write!(f, "Transform Error: length mismatch: expected {expected}, got {actual}")
            }

            // ---- Numerical ----
            TransformError::NonFiniteOutput { backend, index } => {
                write!(
                    f,
                    "Transform Error: backend '{backend}' produced a non-finite value at index \
                     {index}"
                )
            }
            TransformError::BackendUnavailable { backend, reason } => {
                write!(f, "Transform Error: backend '{backend}' unavailable: {reason}")
            }

            // ---- Configuration ----
            TransformError::InvalidBackend { name, reason } => {
                write!(f, "Transform Error: invalid backend '{name}'. {reason}")
            }

        }
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<TransformError> for pyo3::PyErr {
    fn from(err: TransformError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
