//! Gaussian (N0) noise of a quadratic-estimator pair.
//!
//! Purpose
//! -------
//! Compute the unnormalized analytic noise `N_L` between estimators `k1` and
//! `k2` from the spectra of the inverse-variance filtered maps. `k1 ≠ k2`
//! gives cross-noise, and separate filtered spectra for the two legs (`aa`,
//! `bb`, `ab`) give the noise of estimators built on distinct maps.
//!
//! Key behaviors
//! -------------
//! - Every pair of quadratic terms contributes four contractions: legs
//!   paired directly and swapped, each at the input spins and at their
//!   negation.
//! - Gradient is the half-sum of the direct and parity-weighted negated
//!   contractions; curl is the half-difference.
//! - Estimators of different families (first key letter) are uncorrelated:
//!   a zero pair is returned without touching the kernel.
use crate::{
    estimators::{
        coupling::{coupling, parity},
        errors::EstimatorResult,
        keys::EstimatorKey,
        spectra::Spectra,
        weights::estimator_weights,
    },
    response::{GradCurl, accumulate, join_cls},
    transform::kernel::ConvolutionKernel,
};
use ndarray::Array1;
use tracing::debug;

/// Analytic N0 noise of the estimator pair `(k1, k2)`.
///
/// Parameters
/// ----------
/// - `kernel`: convolution kernel.
/// - `k1`, `k2`: estimators.
/// - `cls_weights`: spectra entering the weights of both estimators.
/// - `cls_ivfs`: spectra of the filtered maps (`aa`).
/// - `lmax_qe`: max multipole of the filtered maps.
/// - `lmax_out`: output max multipole, default `2 lmax_qe`. Entries above
///   `2 lmax_qe` stay zero.
/// - `cls_ivfs_bb`: filtered spectra of the second leg, default `cls_ivfs`.
/// - `cls_ivfs_ab`: cross spectra between legs (`ab = ba`), default
///   `cls_ivfs`.
///
/// Returns
/// -------
/// [`GradCurl`] of length `lmax_out + 1`.
///
/// Errors
/// ------
/// - Weight-building and coupling errors; wrapped transform failures.
#[allow(clippy::too_many_arguments)]
pub fn get_nhl(
    kernel: &ConvolutionKernel, k1: EstimatorKey, k2: EstimatorKey, cls_weights: &Spectra,
    cls_ivfs: &Spectra, lmax_qe: usize, lmax_out: Option<usize>, cls_ivfs_bb: Option<&Spectra>,
    cls_ivfs_ab: Option<&Spectra>,
) -> EstimatorResult<GradCurl> {
    let lmax_out = lmax_out.unwrap_or(2 * lmax_qe);
    let mut out = GradCurl::zeros(lmax_out + 1);
    if k1.family() != k2.family() {
        debug!(k1 = %k1, k2 = %k2, "estimator families differ, noise is zero");
        return Ok(out);
    }
    let terms1 = estimator_weights(k1, lmax_qe, cls_weights)?;
    let terms2 = estimator_weights(k2, lmax_qe, cls_weights)?;
    let aa = cls_ivfs;
    let bb = cls_ivfs_bb.unwrap_or(cls_ivfs);
    let ab = cls_ivfs_ab.unwrap_or(cls_ivfs);
    let ba = ab;
    debug!(k1 = %k1, k2 = %k2, lmax_qe, lmax_out, "computing analytic N0");

    for q1 in terms1.iter() {
        for q2 in terms2.iter() {
            let (si, ti) = (q1.leg_a.spin_in, q1.leg_b.spin_in);
            let (ui, vi) = (q2.leg_a.spin_in, q2.leg_b.spin_in);
            let (so, to) = (q1.leg_a.spin_out, q1.leg_b.spin_out);
            let (uo, vo) = (q2.leg_a.spin_out, q2.leg_b.spin_out);
            let rescale = |h: Array1<f64>| {
                join_cls(&[h.view(), q1.cl_out.view(), q2.cl_out.view()])
            };

            // Direct spins.
            let (a1, b1) = (q1.leg_a.cl.view(), q1.leg_b.cl.view());
            let (a2, b2) = (q2.leg_a.cl.view(), q2.leg_b.cl.view());
            let c_clsu = coupling(si, ui, aa)?;
            let clsu = join_cls(&[a1, a2, c_clsu.view()]);
            let c_cltv = coupling(ti, vi, bb)?;
            let cltv = join_cls(&[b1, b2, c_cltv.view()]);
            let mut direct =
                rescale(kernel.get_hl(clsu.view(), cltv.view(), so, uo, to, vo, Some(lmax_out))?);
            let c_clsv = coupling(si, vi, ab)?;
            let clsv = join_cls(&[a1, b2, c_clsv.view()]);
            let c_cltu = coupling(ti, ui, ba)?;
            let cltu = join_cls(&[b1, a2, c_cltu.view()]);
            direct +=
                &rescale(kernel.get_hl(clsv.view(), cltu.view(), so, vo, to, uo, Some(lmax_out))?);

            // Negated first-estimator spins.
            let a_neg = &q1.leg_a.cl * parity(si + so);
            let b_neg = &q1.leg_b.cl * parity(ti + to);
            let c_clsu = coupling(-si, ui, aa)?;
            let clsu = join_cls(&[a_neg.view(), a2, c_clsu.view()]);
            let c_cltv = coupling(-ti, vi, bb)?;
            let cltv = join_cls(&[b_neg.view(), b2, c_cltv.view()]);
            let mut negated =
                rescale(kernel.get_hl(clsu.view(), cltv.view(), -so, uo, -to, vo, Some(lmax_out))?);
            let c_clsv = coupling(-si, vi, ab)?;
            let clsv = join_cls(&[a_neg.view(), b2, c_clsv.view()]);
            let c_cltu = coupling(-ti, ui, ba)?;
            let cltu = join_cls(&[b_neg.view(), a2, c_cltu.view()]);
            let h = kernel.get_hl(clsv.view(), cltu.view(), -so, vo, -to, uo, Some(lmax_out))?;
            negated += &rescale(h);

            let sign = parity(so + to);
            accumulate(&mut out.gradient, &direct, 0.5);
            accumulate(&mut out.gradient, &negated, 0.5 * sign);
            accumulate(&mut out.curl, &direct, 0.5);
            accumulate(&mut out.curl, &negated, -0.5 * sign);
        }
    }
    Ok(out)
}
