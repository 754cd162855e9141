//! Errors for the persistent result cache.
//!
//! [`CacheError`] separates configuration failures of a cache directory
//! (hash mismatch, missing hash record) from I/O and store failures, and
//! wraps estimator failures raised while computing a missing entry.
use crate::estimators::errors::EstimatorError;

pub type CacheResult<T> = Result<T, CacheError>;

/// Unified error type for hash records, result stores and libraries.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    // ---- Configuration ----
    /// Stored hash record disagrees with the current inputs.
    HashMismatch { field: String, stored: String, current: String },

    /// Hash record absent after the construction barrier.
    MissingHashRecord { path: String },

    // ---- Storage ----
    Io(String),

    /// SQLite failure.
    Store(String),

    /// Malformed JSON hash record.
    Serialization(String),

    // ---- Computation ----
    Estimator(EstimatorError),

    // ---- Anyhow catchall ----
    /// Context-annotated failure, e.g. creating the library directory.
    Anyhow(String),
}

impl std::error::Error for CacheError {}

impl From<EstimatorError> for CacheError {
    fn from(err: EstimatorError) -> Self {
        CacheError::Estimator(err)
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Anyhow(format!("{err:#}"))
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            CacheError::HashMismatch { field, stored, current } => write!(
                f,
                "Cache Error: hash mismatch on '{field}' (stored {stored}, current {current}); \
                 the cache directory belongs to different inputs"
            ),
            CacheError::MissingHashRecord { path } => {
                write!(f, "Cache Error: no hash record at {path}")
            }

            // ---- Storage ----
            CacheError::Io(msg) => write!(f, "Cache Error: I/O failure: {msg}"),
            CacheError::Store(msg) => write!(f, "Cache Error: store failure: {msg}"),
            CacheError::Serialization(msg) => {
                write!(f, "Cache Error: malformed hash record: {msg}")
            }

            // ---- Computation ----
            CacheError::Estimator(err) => write!(f, "{err}"),

            // ---- Anyhow catchall ----
            CacheError::Anyhow(msg) => write!(f, "Cache Error: {msg}"),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<CacheError> for pyo3::PyErr {
    fn from(err: CacheError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_mismatched_field() {
        let err = CacheError::HashMismatch {
            field: "clscmb tt".to_string(),
            stored: "ab".to_string(),
            current: "cd".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Cache Error:"));
        assert!(msg.contains("clscmb tt"));
    }

    #[test]
    fn estimator_errors_are_wrapped_verbatim() {
        let inner = EstimatorError::MissingChannel { channel: "tt" };
        let err = CacheError::from(inner.clone());
        assert_eq!(err, CacheError::Estimator(inner.clone()));
        assert_eq!(err.to_string(), inner.to_string());
    }

    #[test]
    fn context_chain_survives_the_anyhow_bridge() {
        use anyhow::Context;
        let res: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such entry"));
        let err = CacheError::from(res.context("cannot create library directory /x").unwrap_err());
        let msg = err.to_string();
        assert!(msg.contains("cannot create library directory /x"));
        assert!(msg.contains("no such entry"));
    }
}
