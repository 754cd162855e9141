//! Deflection-induced mean-field response.
//!
//! Purpose
//! -------
//! Compute the response of the lensing estimator's mean field to the
//! deflection field, for temperature-only (`ptt`) and polarization-only
//! (`p_p`) estimators with separate T/P filtering.
//!
//! Key behaviors
//! -------------
//! - Term I couples the filtered spectra with the CMB spectra minus their
//!   Wiener-filtered part, through spin raising/lowering on both sides.
//! - Term II is the Fisher-type product of the Wiener filters `C · F`.
//! - The `L = 1` curl value of `I − II` is subtracted from both gradient
//!   and curl before rescaling by `¼ L(L+1)`; the degree-1 curl response is
//!   pinned to zero this way.
//!
//! Invariants & assumptions
//! ------------------------
//! - Minimum-variance (`p`) and curl keys are not supported.
//! - `p_p` requires a vanishing CMB `bb` spectrum.
//! - Accuracy degrades at the lowest multipoles; values there should be
//!   treated with care.
use crate::{
    estimators::{
        coupling::{coupling, lower_response, parity, raise_response},
        errors::{EstimatorError, EstimatorResult},
        keys::EstimatorKey,
        spectra::{Spectra, SpectrumChannel},
    },
    response::{GradCurl, accumulate},
    transform::kernel::ConvolutionKernel,
};
use ndarray::{Array1, ArrayView1, s};
use tracing::{debug, warn};

const TEMPERATURE_SPINS: &[i32] = &[0];
const POLARIZATION_SPINS: &[i32] = &[-2, 2];

/// Mean-field response of `key` (`ptt` or `p_p`) to lensing.
///
/// Parameters
/// ----------
/// - `kernel`: convolution kernel.
/// - `key`: estimator, `ptt` or `p_p`.
/// - `cls_cmb`: CMB spectra, covering at least `lmax_qe + 1` multipoles.
/// - `cls_ivfs`: spectra of the filtered maps.
/// - `lmax_qe`: max multipole of the filtered maps.
/// - `lmax_out`: output max multipole.
///
/// Returns
/// -------
/// [`GradCurl`] of length `lmax_out + 1`.
///
/// Errors
/// ------
/// - [`EstimatorError::UnsupportedMeanField`] for other keys.
/// - [`EstimatorError::NotImplemented`] for `p_p` with non-zero CMB `bb`.
/// - [`EstimatorError::SequenceTooShort`] if spectra do not reach `lmax_qe`.
pub fn get_mf_resp(
    kernel: &ConvolutionKernel, key: EstimatorKey, cls_cmb: &Spectra, cls_ivfs: &Spectra,
    lmax_qe: usize, lmax_out: usize,
) -> EstimatorResult<GradCurl> {
    let (spins, lmax_cmb) = match key {
        EstimatorKey::Ptt => {
            (TEMPERATURE_SPINS, cls_cmb.require(SpectrumChannel::TT)?.len().saturating_sub(1))
        }
        EstimatorKey::PP => {
            let ee = cls_cmb.require(SpectrumChannel::EE)?;
            let bb = cls_cmb.require(SpectrumChannel::BB)?;
            if bb.iter().any(|&v| v != 0.0) {
                return Err(EstimatorError::NotImplemented {
                    reason: "mean-field response with non-zero CMB bb",
                });
            }
            (POLARIZATION_SPINS, ee.len().min(bb.len()).saturating_sub(1))
        }
        other => return Err(EstimatorError::UnsupportedMeanField { key: other.as_str() }),
    };
    if lmax_qe > lmax_cmb {
        return Err(EstimatorError::SequenceTooShort {
            channel: "cmb",
            required: lmax_qe + 1,
            actual: lmax_cmb + 1,
        });
    }
    debug!(estimator = %key, lmax_qe, lmax_cmb, lmax_out, "computing mean-field response");
    warn!(estimator = %key, "mean-field response is inaccurate at the lowest multipoles");

    let (wiener_sq, wiener) = wiener_spectra(key, cls_cmb, cls_ivfs, lmax_qe)?;
    let term_one = fisher_term_one(
        kernel, spins, cls_cmb, cls_ivfs, &wiener_sq, lmax_qe, lmax_cmb, lmax_out,
    )?;
    let term_two = fisher_term_two(kernel, spins, &wiener, lmax_qe, lmax_out)?;

    let mut gradient = &term_one.gradient - &term_two.gradient;
    let mut curl = &term_one.curl - &term_two.curl;
    let dipole = curl.get(1).copied().unwrap_or(0.0);
    debug!(
        curl_l1 = dipole,
        gradient_l1_before = gradient.get(1).copied().unwrap_or(0.0),
        gradient_l1_after = gradient.get(1).copied().unwrap_or(0.0) - dipole,
        "mean-field degree-1 subtraction"
    );
    gradient -= dipole;
    curl -= dipole;
    let q = Array1::from_shape_fn(lmax_out + 1, |l| 0.25 * (l * (l + 1)) as f64);
    Ok(GradCurl { gradient: gradient * &q, curl: curl * &q })
}

/// `C² F` and `C F` on `l ≤ lmax_qe` for the channels `key` uses.
fn wiener_spectra(
    key: EstimatorKey, cls_cmb: &Spectra, cls_ivfs: &Spectra, lmax_qe: usize,
) -> EstimatorResult<(Spectra, Spectra)> {
    let channel = if key == EstimatorKey::Ptt { SpectrumChannel::TT } else { SpectrumChannel::EE };
    let cmb = cls_cmb.require_up_to(channel, lmax_qe)?;
    let ivf = cls_ivfs.require_up_to(channel, lmax_qe)?;
    let wiener = &cmb * &ivf;
    let wiener_sq = &wiener * &cmb;
    let mut sq = Spectra::new().with(channel, wiener_sq);
    let mut lin = Spectra::new().with(channel, wiener);
    if key == EstimatorKey::PP {
        sq = sq.with(SpectrumChannel::BB, Array1::zeros(lmax_qe + 1));
        lin = lin.with(SpectrumChannel::BB, Array1::zeros(lmax_qe + 1));
    }
    Ok((sq, lin))
}

/// `½` per polarization spin, from `½` in each `B` of `B Cov⁻¹ B†`.
fn half_if_polarized(s: i32) -> f64 {
    if s != 0 { 0.5 } else { 1.0 }
}

fn spin_operator(a: i32, s: i32, lmax: usize) -> Array1<f64> {
    if a == -1 { lower_response(s, lmax) } else { raise_response(s, lmax) }
}

fn head(cl: Array1<f64>, lmax: usize, channel: &'static str) -> EstimatorResult<Array1<f64>> {
    if cl.len() < lmax + 1 {
        let (required, actual) = (lmax + 1, cl.len());
        return Err(EstimatorError::SequenceTooShort { channel, required, actual });
    }
    Ok(cl.slice_move(s![..lmax + 1]))
}

fn any_nonzero(cl: ArrayView1<f64>) -> bool {
    cl.iter().any(|&v| v != 0.0)
}

#[allow(clippy::too_many_arguments)]
fn fisher_term_one(
    kernel: &ConvolutionKernel, spins: &[i32], cls_cmb: &Spectra, cls_ivfs: &Spectra,
    wiener_sq: &Spectra, lmax_qe: usize, lmax_cmb: usize, lmax_out: usize,
) -> EstimatorResult<GradCurl> {
    let mut out = GradCurl::zeros(lmax_out + 1);
    for &s1 in spins {
        for &s2 in spins {
            let cl1 = head(coupling(s1, s2, cls_ivfs)?, lmax_qe, "ivfs")?
                * (half_if_polarized(s1) * half_if_polarized(s2));
            let mut cl2 = head(coupling(s2, s1, cls_cmb)?, lmax_cmb, "cmb")?;
            let filtered = coupling(s2, s1, wiener_sq)?;
            cl2.slice_mut(s![..lmax_qe + 1]).zip_mut_with(&filtered, |c, &w| *c -= w);
            if !(any_nonzero(cl1.view()) && any_nonzero(cl2.view())) {
                continue;
            }
            // b = 1 only; the (a, b) sum is symmetric, hence the factor 2.
            let b = 1;
            let lowered = lower_response(-s1, lmax_cmb);
            for a in [-1, 1] {
                let cl2_ab = &cl2 * &spin_operator(a, s2, lmax_cmb) * &lowered;
                let h = kernel
                    .get_hl(cl1.view(), cl2_ab.view(), s2, s1, -s2 - a, -s1 - b, Some(lmax_out))?
                    * (2.0 * parity(s1 + s2));
                accumulate(&mut out.gradient, &h, f64::from(-a * b));
                accumulate(&mut out.curl, &h, -1.0);
            }
        }
    }
    Ok(out)
}

fn fisher_term_two(
    kernel: &ConvolutionKernel, spins: &[i32], wiener: &Spectra, lmax_qe: usize, lmax_out: usize,
) -> EstimatorResult<GradCurl> {
    let mut out = GradCurl::zeros(lmax_out + 1);
    for &s1 in spins {
        for &s2 in spins {
            let cl1 = head(coupling(s2, s1, wiener)?, lmax_qe, "wiener")? * half_if_polarized(s1);
            let cl2 = head(coupling(s1, s2, wiener)?, lmax_qe, "wiener")? * half_if_polarized(s2);
            if !(any_nonzero(cl1.view()) && any_nonzero(cl2.view())) {
                continue;
            }
            let b = 1;
            let cl2_b = &cl2 * &lower_response(s1, lmax_qe);
            for a in [-1, 1] {
                let cl1_a = &cl1 * &spin_operator(a, s2, lmax_qe);
                let h = kernel
                    .get_hl(cl1_a.view(), cl2_b.view(), -s2 - a, -s1, s2, s1 - b, Some(lmax_out))?
                    * (2.0 * parity(s1 + s2));
                accumulate(&mut out.gradient, &h, f64::from(-a * b));
                accumulate(&mut out.curl, &h, -1.0);
            }
        }
    }
    Ok(out)
}
