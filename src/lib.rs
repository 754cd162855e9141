//! qe_response — responses, noise and mean fields of CMB quadratic estimators.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! the analytic quadratic-estimator routines to Python via the `_qe_response`
//! extension module (feature `python-bindings`).
//!
//! Key behaviors
//! -------------
//! - [`transform`]: Gauss–Legendre nodes, Wigner small-d backends and the
//!   spin-weighted convolution kernel `get_hl`.
//! - [`estimators`]: estimator and source keys, spectra containers, spin
//!   couplings, response legs and quadratic-estimator weights.
//! - [`response`]: response (`get_response_sep_tp`), Gaussian noise
//!   (`get_nhl`) and mean-field response (`get_mf_resp`) assemblers.
//! - [`cache`]: hash-validated on-disk memoization of responses and noise.
//!
//! Invariants & assumptions
//! ------------------------
//! - All heavy numerical work lives in the inner modules; the PyO3 items here
//!   perform only argument conversion and error mapping.
//! - Inputs are never modified; every call returns freshly allocated arrays.
//!
//! Conventions
//! -----------
//! - Harmonic sequences are indexed by multipole `l = 0..=lmax`.
//! - Python callers pass spectra and filters as dicts of 1-D float arrays and
//!   receive `(gradient, curl)` tuples of numpy arrays.
//! - Errors from core Rust code are converted to `ValueError` at the PyO3
//!   boundary.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   the end-to-end tests under `tests/`.

pub mod cache;
pub mod estimators;
pub mod response;
pub mod transform;
pub mod utils;

pub use crate::response::GradCurl;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyDict};

#[cfg(feature = "python-bindings")]
use std::sync::Mutex;

#[cfg(feature = "python-bindings")]
use crate::{
    cache::{NoiseLibrary, ResponseLibrary, SingleProcess},
    estimators::keys::{EstimatorKey, SourceKey},
    transform::{BackendKind, ConvolutionKernel},
    utils::{extract_filters, extract_spectra},
};

#[cfg(feature = "python-bindings")]
type PyGradCurl<'py> = (Bound<'py, PyArray1<f64>>, Bound<'py, PyArray1<f64>>);

#[cfg(feature = "python-bindings")]
fn into_py_pair<'py>(py: Python<'py>, gc: GradCurl) -> PyGradCurl<'py> {
    (gc.gradient.into_pyarray(py), gc.curl.into_pyarray(py))
}

#[cfg(feature = "python-bindings")]
fn kernel_for(backend: Option<&str>) -> PyResult<ConvolutionKernel> {
    let kind: BackendKind = match backend {
        Some(name) => name.parse()?,
        None => BackendKind::default(),
    };
    Ok(ConvolutionKernel::new(kind))
}

/// Response of estimator `k` to anisotropy source `ksource`.
///
/// Returns `(gradient, curl)` up to `min(lmax_out, 2 lmax_qe)`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (
    k, lmax_qe, ksource, cls_weight, cls_cmb, fal_leg1,
    fal_leg2 = None, lmax_out = None, backend = None
))]
#[allow(clippy::too_many_arguments)]
fn get_response_sep_tp<'py>(
    py: Python<'py>, k: &str, lmax_qe: usize, ksource: &str, cls_weight: &Bound<'py, PyDict>,
    cls_cmb: &Bound<'py, PyDict>, fal_leg1: &Bound<'py, PyDict>,
    fal_leg2: Option<&Bound<'py, PyDict>>, lmax_out: Option<usize>, backend: Option<&str>,
) -> PyResult<PyGradCurl<'py>> {
    let key: EstimatorKey = k.parse()?;
    let source: SourceKey = ksource.parse()?;
    let cls_weight = extract_spectra(py, cls_weight)?;
    let cls_cmb = extract_spectra(py, cls_cmb)?;
    let fal_leg1 = extract_filters(py, fal_leg1)?;
    let fal_leg2 = fal_leg2.map(|d| extract_filters(py, d)).transpose()?;
    let kernel = kernel_for(backend)?;
    let gc = response::get_response_sep_tp(
        &kernel,
        key,
        lmax_qe,
        source,
        &cls_weight,
        &cls_cmb,
        &fal_leg1,
        fal_leg2.as_ref(),
        lmax_out,
    )?;
    Ok(into_py_pair(py, gc))
}

/// Unnormalized analytic N0 of the estimator pair `(k1, k2)`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (
    k1, k2, cls_weights, cls_ivfs, lmax_qe,
    lmax_out = None, cls_ivfs_bb = None, cls_ivfs_ab = None, backend = None
))]
#[allow(clippy::too_many_arguments)]
fn get_nhl<'py>(
    py: Python<'py>, k1: &str, k2: &str, cls_weights: &Bound<'py, PyDict>,
    cls_ivfs: &Bound<'py, PyDict>, lmax_qe: usize, lmax_out: Option<usize>,
    cls_ivfs_bb: Option<&Bound<'py, PyDict>>, cls_ivfs_ab: Option<&Bound<'py, PyDict>>,
    backend: Option<&str>,
) -> PyResult<PyGradCurl<'py>> {
    let k1: EstimatorKey = k1.parse()?;
    let k2: EstimatorKey = k2.parse()?;
    let cls_weights = extract_spectra(py, cls_weights)?;
    let cls_ivfs = extract_spectra(py, cls_ivfs)?;
    let cls_ivfs_bb = cls_ivfs_bb.map(|d| extract_spectra(py, d)).transpose()?;
    let cls_ivfs_ab = cls_ivfs_ab.map(|d| extract_spectra(py, d)).transpose()?;
    let kernel = kernel_for(backend)?;
    let gc = response::get_nhl(
        &kernel,
        k1,
        k2,
        &cls_weights,
        &cls_ivfs,
        lmax_qe,
        lmax_out,
        cls_ivfs_bb.as_ref(),
        cls_ivfs_ab.as_ref(),
    )?;
    Ok(into_py_pair(py, gc))
}

/// Deflection-induced mean-field response (`ptt` or `p_p`).
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (k, cls_cmb, cls_ivfs, lmax_qe, lmax_out, backend = None))]
fn get_mf_resp<'py>(
    py: Python<'py>, k: &str, cls_cmb: &Bound<'py, PyDict>, cls_ivfs: &Bound<'py, PyDict>,
    lmax_qe: usize, lmax_out: usize, backend: Option<&str>,
) -> PyResult<PyGradCurl<'py>> {
    let key: EstimatorKey = k.parse()?;
    let cls_cmb = extract_spectra(py, cls_cmb)?;
    let cls_ivfs = extract_spectra(py, cls_ivfs)?;
    let kernel = kernel_for(backend)?;
    let gc = response::get_mf_resp(&kernel, key, &cls_cmb, &cls_ivfs, lmax_qe, lmax_out)?;
    Ok(into_py_pair(py, gc))
}

/// ResponseLib — Python-facing wrapper of [`ResponseLibrary`].
///
/// Constructed as `ResponseLib(lib_dir, lmax_qe, cls_weight, cls_cmb, fal,
/// lmax_qlm)` in a single-process group with the default backend.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "qe_response")]
pub struct ResponseLib {
    inner: Mutex<ResponseLibrary>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl ResponseLib {
    #[new]
    #[pyo3(signature = (lib_dir, lmax_qe, cls_weight, cls_cmb, fal, lmax_qlm))]
    pub fn new<'py>(
        py: Python<'py>, lib_dir: &str, lmax_qe: usize, cls_weight: &Bound<'py, PyDict>,
        cls_cmb: &Bound<'py, PyDict>, fal: &Bound<'py, PyDict>, lmax_qlm: usize,
    ) -> PyResult<ResponseLib> {
        let lib = ResponseLibrary::open(
            lib_dir,
            lmax_qe,
            extract_spectra(py, cls_weight)?,
            extract_spectra(py, cls_cmb)?,
            extract_filters(py, fal)?,
            lmax_qlm,
            &SingleProcess,
            ConvolutionKernel::default(),
        )?;
        Ok(ResponseLib { inner: Mutex::new(lib) })
    }

    #[pyo3(signature = (k, ksource, recache = false))]
    pub fn get_response<'py>(
        &self, py: Python<'py>, k: &str, ksource: &str, recache: bool,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let key: EstimatorKey = k.parse()?;
        let source: SourceKey = ksource.parse()?;
        let mut lib =
            self.inner.lock().map_err(|_| PyValueError::new_err("response library poisoned"))?;
        Ok(lib.get_response(key, source, recache)?.into_pyarray(py))
    }
}

/// NoiseLib — Python-facing wrapper of [`NoiseLibrary`].
#[cfg(feature = "python-bindings")]
#[pyclass(module = "qe_response")]
pub struct NoiseLib {
    inner: Mutex<NoiseLibrary>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl NoiseLib {
    #[new]
    #[pyo3(signature = (lib_dir, lmax_qe, cls_weight, cls_ivfs))]
    pub fn new<'py>(
        py: Python<'py>, lib_dir: &str, lmax_qe: usize, cls_weight: &Bound<'py, PyDict>,
        cls_ivfs: &Bound<'py, PyDict>,
    ) -> PyResult<NoiseLib> {
        let lib = NoiseLibrary::open(
            lib_dir,
            lmax_qe,
            extract_spectra(py, cls_weight)?,
            extract_spectra(py, cls_ivfs)?,
            &SingleProcess,
            ConvolutionKernel::default(),
        )?;
        Ok(NoiseLib { inner: Mutex::new(lib) })
    }

    #[pyo3(signature = (k1, k2, recache = false))]
    pub fn get_nhl<'py>(
        &self, py: Python<'py>, k1: &str, k2: &str, recache: bool,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let k1: EstimatorKey = k1.parse()?;
        let k2: EstimatorKey = k2.parse()?;
        let mut lib =
            self.inner.lock().map_err(|_| PyValueError::new_err("noise library poisoned"))?;
        Ok(lib.get_nhl(k1, k2, recache)?.into_pyarray(py))
    }
}

/// _qe_response — PyO3 module initializer for the Python extension.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _qe_response<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_response_sep_tp, m)?)?;
    m.add_function(wrap_pyfunction!(get_nhl, m)?)?;
    m.add_function(wrap_pyfunction!(get_mf_resp, m)?)?;
    m.add_class::<ResponseLib>()?;
    m.add_class::<NoiseLib>()?;
    Ok(())
}
