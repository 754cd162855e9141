//! Argument extraction for the Python bindings.
//!
//! Spectra and filters arrive from Python as dicts mapping channel names
//! (`"tt"`, `"ee"`, `"bb"`, `"te"` / `"t"`, `"e"`, `"b"`) to 1-D float
//! arrays. Unknown channel names are rejected.
#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::PyValueError,
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
};

#[cfg(feature = "python-bindings")]
use crate::estimators::spectra::{FilterChannel, Filters, Spectra, SpectrumChannel};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        let msg = "expected a 1-D numpy.ndarray or sequence of float64";
        pyo3::exceptions::PyTypeError::new_err(msg)
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// `{"tt": ..., "ee": ...}` → [`Spectra`].
#[cfg(feature = "python-bindings")]
pub fn extract_spectra<'py>(py: Python<'py>, raw: &Bound<'py, PyDict>) -> PyResult<Spectra> {
    let mut cls = Spectra::new();
    for (name, value) in raw.iter() {
        let name: String = name.extract()?;
        let channel = SpectrumChannel::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| PyValueError::new_err(format!("unknown spectrum channel '{name}'")))?;
        let arr = extract_f64_array(py, &value)?;
        cls = cls.with(channel, arr.as_array().to_owned());
    }
    Ok(cls)
}

/// `{"t": ..., "e": ..., "b": ...}` → [`Filters`].
#[cfg(feature = "python-bindings")]
pub fn extract_filters<'py>(py: Python<'py>, raw: &Bound<'py, PyDict>) -> PyResult<Filters> {
    let mut fal = Filters::new();
    for (name, value) in raw.iter() {
        let name: String = name.extract()?;
        let channel = FilterChannel::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| PyValueError::new_err(format!("unknown filter channel '{name}'")))?;
        let arr = extract_f64_array(py, &value)?;
        fal = fal.with(channel, arr.as_array().to_owned());
    }
    Ok(fal)
}
