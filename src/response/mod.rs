//! response — response, noise and mean-field assemblers.
//!
//! Purpose
//! -------
//! Combine estimator weights, spin couplings and the convolution kernel into
//! the three harmonic-space quantities downstream users need:
//! - [`get_response_sep_tp`]: linear response of an estimator to an
//!   anisotropy source, for separate T/P isotropic filtering.
//! - [`get_nhl`]: Gaussian (N0) noise of an estimator pair.
//! - [`get_mf_resp`]: deflection-induced mean-field response.
//!
//! Key behaviors
//! -------------
//! - Every quantity is returned as a [`GradCurl`] pair of sequences.
//! - All calls are synchronous and allocate fresh outputs; inputs are
//!   borrowed and never modified.
//!
//! Conventions
//! -----------
//! - Output sequences are indexed by multipole `L = 0..=lmax_out`.
//! - Lensing outputs refer to the potentials `φ`, `Ω`; the gradient/curl
//!   split follows the sum/difference of the `±r` source components.
//!
//! Testing notes
//! -------------
//! - Response and N0 agree under optimal filtering; see the unit tests in
//!   `noise` and the integration tests under `tests/`.

pub mod mean_field;
pub mod noise;
pub mod response;

pub use self::mean_field::get_mf_resp;
pub use self::noise::get_nhl;
pub use self::response::get_response_sep_tp;

use ndarray::{Array1, ArrayView1, s};

/// Gradient and curl sequences of a response or noise calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct GradCurl {
    pub gradient: Array1<f64>,
    pub curl: Array1<f64>,
}

impl GradCurl {
    pub fn zeros(len: usize) -> Self {
        GradCurl { gradient: Array1::zeros(len), curl: Array1::zeros(len) }
    }

    pub fn len(&self) -> usize {
        self.gradient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradient.is_empty()
    }

    /// Curl sequence if `curl`, gradient otherwise.
    pub fn select(&self, curl: bool) -> &Array1<f64> {
        if curl { &self.curl } else { &self.gradient }
    }
}

/// Element-wise product of sequences, truncated to the shortest one.
pub fn join_cls(cls: &[ArrayView1<f64>]) -> Array1<f64> {
    let Some(n) = cls.iter().map(|cl| cl.len()).min() else {
        return Array1::zeros(0);
    };
    let mut out = Array1::<f64>::ones(n);
    for cl in cls {
        out *= &cl.slice(s![..n]);
    }
    out
}

/// Add `src` into the leading entries of `acc`.
pub(crate) fn accumulate(acc: &mut Array1<f64>, src: &Array1<f64>, scale: f64) {
    let n = acc.len().min(src.len());
    acc.slice_mut(s![..n]).scaled_add(scale, &src.slice(s![..n]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn join_cls_truncates_to_shortest() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![4.0, 5.0];
        let c = array![0.5, 0.5, 0.5, 0.5];
        assert_eq!(join_cls(&[a.view(), b.view(), c.view()]), array![2.0, 5.0]);
        assert_eq!(join_cls(&[]), Array1::<f64>::zeros(0));
    }

    #[test]
    fn accumulate_respects_shorter_source() {
        let mut acc = array![1.0, 1.0, 1.0];
        accumulate(&mut acc, &array![2.0, 4.0], -0.5);
        assert_eq!(acc, array![0.0, -1.0, 1.0]);
    }

    #[test]
    fn select_picks_curl_for_curl_keys() {
        let gc = GradCurl { gradient: array![1.0], curl: array![2.0] };
        assert_eq!(gc.select(true), &array![2.0]);
        assert_eq!(gc.select(false), &array![1.0]);
        assert_eq!(GradCurl::zeros(3).len(), 3);
    }
}
