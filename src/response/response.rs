//! Estimator response to an anisotropy source (separate T/P filtering).
//!
//! Purpose
//! -------
//! Compute the gradient and curl response `R_L` of a quadratic estimator to
//! a lensing, modulation or point-source anisotropy. The calculation uses
//! the response of the data covariance (not of the fields), so every
//! source handled by [`covariance_response`] is supported uniformly.
//!
//! Key behaviors
//! -------------
//! - For each quadratic term and each secondary spin pair compatible with
//!   the filtering (temperature only for spin 0, both `±2` otherwise), two
//!   kernel contributions are built: the source attached to leg `b`
//!   (`st`) and to leg `a` (`ts`).
//! - Contributions at `+r` and `−r` are combined into gradient (sum) and
//!   curl (difference) with parity `(−1)^{so+to+r}` and the term's output
//!   rescaling.
//! - For `r = 0` the `−r` branch is the `+r` branch; it is not recomputed.
//!
//! Invariants & assumptions
//! ------------------------
//! - Filters are isotropic and independent per T/E/B (no `C^TE` in the
//!   filter), truncated to `lmax_qe`.
//! - `lmax_qlm = min(2 lmax_qe, lmax_out)`.
//! - Curl-mode lensing responses keep a small non-zero `L = 1` value; it is
//!   not forced to zero.
use crate::{
    estimators::{
        coupling::{covariance_response, parity},
        errors::{EstimatorError, EstimatorResult},
        keys::{EstimatorKey, SourceKey},
        spectra::{FilterChannel, Filters, Spectra},
        weights::estimator_weights,
    },
    response::{GradCurl, join_cls},
    transform::kernel::ConvolutionKernel,
};
use ndarray::{Array1, s};
use tracing::debug;

/// Gradient and curl response of estimator `key` to `source`.
///
/// Parameters
/// ----------
/// - `kernel`: convolution kernel (owns backend and node table).
/// - `key`: estimator.
/// - `lmax_qe`: max multipole of the filtered inputs.
/// - `source`: anisotropy source.
/// - `cls_weight`: spectra in the estimator weights.
/// - `cls_cmb`: spectra in the covariance response.
/// - `fal_leg1`: filters of leg `a`.
/// - `fal_leg2`: filters of leg `b`, defaulting to `fal_leg1`.
/// - `lmax_out`: output max multipole, capped at `2 lmax_qe`.
///
/// Returns
/// -------
/// [`GradCurl`] of length `lmax_qlm + 1`.
///
/// Errors
/// ------
/// - Weight-building errors from [`estimator_weights`].
/// - [`EstimatorError::SequenceTooShort`] if a filter or CMB spectrum
///   covers fewer than `lmax_qe + 1` multipoles.
/// - [`EstimatorError::MissingChannel`] for absent filters or spectra.
/// - Wrapped transform failures.
#[allow(clippy::too_many_arguments)]
pub fn get_response_sep_tp(
    kernel: &ConvolutionKernel, key: EstimatorKey, lmax_qe: usize, source: SourceKey,
    cls_weight: &Spectra, cls_cmb: &Spectra, fal_leg1: &Filters, fal_leg2: Option<&Filters>,
    lmax_out: Option<usize>,
) -> EstimatorResult<GradCurl> {
    let terms = estimator_weights(key, lmax_qe, cls_weight)?;
    let lmax_qlm = lmax_out.unwrap_or(2 * lmax_qe).min(2 * lmax_qe);
    let fal1 = fal_leg1.truncated(lmax_qe)?;
    let fal2 = fal_leg2.unwrap_or(fal_leg1).truncated(lmax_qe)?;
    debug!(
        estimator = %key,
        source = %source,
        lmax_qe,
        lmax_qlm,
        terms = terms.len(),
        "computing estimator response"
    );

    let n_out = lmax_qlm + 1;
    let mut out = GradCurl::zeros(n_out);
    for term in terms.iter() {
        let (si, ti) = (term.leg_a.spin_in, term.leg_b.spin_in);
        let (so, to) = (term.leg_a.spin_out, term.leg_b.spin_out);
        let cl_out = term.cl_out.slice(s![..n_out]);

        for &s2 in secondary_spins(si) {
            let Some(fa) = filter_element(si, s2, &fal1)? else { continue };
            for &t2 in secondary_spins(ti) {
                let Some(fb) = filter_element(ti, t2, &fal2)? else { continue };

                let w_st = covariance_response(source, -s2, t2, cls_cmb, fb.len() - 1)?;
                let w_ts = covariance_response(source, -t2, s2, cls_cmb, fa.len() - 1)?;
                let r = w_st.r;
                let scale_st = w_st.cl_scale.slice(s![..n_out]);
                let scale_ts = w_ts.cl_scale.slice(s![..n_out]);

                let a_plain = join_cls(&[term.leg_a.cl.view(), fa.view()]);
                let b_plain = join_cls(&[term.leg_b.cl.view(), fb.view()]);

                // Source at +r.
                let b_resp = join_cls(&[term.leg_b.cl.view(), fb.view(), w_st.minus.view()]);
                let a_resp = join_cls(&[term.leg_a.cl.view(), fa.view(), w_ts.minus.view()]);
                let mut r_plus = kernel.get_hl(
                    a_plain.view(),
                    b_resp.view(),
                    so,
                    s2,
                    to,
                    -s2 + r,
                    Some(lmax_qlm),
                )? * &scale_st;
                r_plus += &(kernel.get_hl(
                    a_resp.view(),
                    b_plain.view(),
                    so,
                    -t2 + r,
                    to,
                    t2,
                    Some(lmax_qlm),
                )? * &scale_ts);

                // Source at −r.
                let r_minus = if r > 0 {
                    let b_resp = join_cls(&[term.leg_b.cl.view(), fb.view(), w_st.plus.view()]);
                    let a_resp = join_cls(&[term.leg_a.cl.view(), fa.view(), w_ts.plus.view()]);
                    let mut acc = kernel.get_hl(
                        a_plain.view(),
                        b_resp.view(),
                        so,
                        s2,
                        to,
                        -s2 - r,
                        Some(lmax_qlm),
                    )? * &scale_st;
                    acc += &(kernel.get_hl(
                        a_resp.view(),
                        b_plain.view(),
                        so,
                        -t2 - r,
                        to,
                        t2,
                        Some(lmax_qlm),
                    )? * &scale_ts);
                    acc
                } else {
                    r_plus.clone()
                };

                let sign = parity(so + to + r);
                let sign_r = parity(r);
                out.gradient += &((&r_plus + &(&r_minus * sign_r)) * &cl_out * sign);
                out.curl += &((&r_plus - &(&r_minus * sign_r)) * &cl_out * sign);
            }
        }
    }
    Ok(out)
}

/// Secondary spins reachable from input spin `s` under T/P filtering.
fn secondary_spins(s: i32) -> &'static [i32] {
    if s == 0 { &[0] } else { &[-2, 2] }
}

/// Filter matrix element `F(s1, s2)` for independent T/E/B filtering.
///
/// `t` for `(0, 0)`, `½(e + b)` for equal `±2` spins, `½(e − b)` for
/// opposite `±2` spins, `None` for mixed temperature/polarization.
fn filter_element(s1: i32, s2: i32, fal: &Filters) -> EstimatorResult<Option<Array1<f64>>> {
    match (s1, s2) {
        (0, 0) => Ok(Some(fal.require(FilterChannel::T)?.to_owned())),
        (0, _) | (_, 0) => Ok(None),
        (2 | -2, 2 | -2) => {
            let e = fal.require(FilterChannel::E)?;
            let b = fal.require(FilterChannel::B)?;
            let sign = if s1 == s2 { 1.0 } else { -1.0 };
            Ok(Some((&e + &(&b * sign)) * 0.5))
        }
        (2 | -2, other) => Err(EstimatorError::InvalidSpin { spin: other }),
        (other, _) => Err(EstimatorError::InvalidSpin { spin: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::spectra::SpectrumChannel;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Output length and lmax capping.
    // - Leg-filter swap symmetry for ptt with equal filters.
    // - Filter matrix elements and failure paths.
    // -------------------------------------------------------------------------

    fn profile(lmax: usize, f: impl Fn(f64) -> f64) -> Array1<f64> {
        Array1::from_shape_fn(lmax + 1, |l| f(l as f64))
    }

    fn cmb(lmax: usize) -> Spectra {
        Spectra::new()
            .with(SpectrumChannel::TT, profile(lmax, |l| 1.0 / (1.0 + 0.3 * l)))
            .with(SpectrumChannel::EE, profile(lmax, |l| 0.5 / (1.0 + 0.2 * l)))
            .with(SpectrumChannel::BB, Array1::zeros(lmax + 1))
            .with(SpectrumChannel::TE, profile(lmax, |l| 0.1 / (1.0 + l)))
    }

    fn filters(lmax: usize, noise: f64) -> Filters {
        Filters::new()
            .with(FilterChannel::T, profile(lmax, |l| 1.0 / (1.0 + noise * l)))
            .with(FilterChannel::E, Array1::from_elem(lmax + 1, 0.8))
            .with(FilterChannel::B, Array1::from_elem(lmax + 1, 0.3))
    }

    #[test]
    fn output_is_capped_at_twice_lmax_qe() {
        let kernel = ConvolutionKernel::default();
        let cls = cmb(4);
        let fal = filters(4, 0.1);
        let resp = get_response_sep_tp(
            &kernel, EstimatorKey::Ptt, 4, SourceKey::Lensing, &cls, &cls, &fal, None, Some(20),
        )
        .unwrap();
        assert_eq!(resp.len(), 9);
        let resp = get_response_sep_tp(
            &kernel, EstimatorKey::Ptt, 4, SourceKey::Lensing, &cls, &cls, &fal, None, Some(3),
        )
        .unwrap();
        assert_eq!(resp.curl.len(), 4);
    }

    #[test]
    // Purpose
    // -------
    // With equal filters on both legs, the ptt response is invariant under
    // swapping the leg filters and equals the single-filter default.
    fn ptt_response_symmetric_under_leg_swap() {
        let kernel = ConvolutionKernel::default();
        let cls = cmb(5);
        let fal = filters(5, 0.2);
        let same = fal.clone();
        let default = get_response_sep_tp(
            &kernel, EstimatorKey::Ptt, 5, SourceKey::Lensing, &cls, &cls, &fal, None, None,
        )
        .unwrap();
        let swapped = get_response_sep_tp(
            &kernel, EstimatorKey::Ptt, 5, SourceKey::Lensing, &cls, &cls, &same, Some(&fal), None,
        )
        .unwrap();
        for l in 0..default.len() {
            assert_relative_eq!(default.gradient[l], swapped.gradient[l], epsilon = 1e-12);
            assert_relative_eq!(default.curl[l], swapped.curl[l], epsilon = 1e-12);
        }
        assert_eq!(default.gradient[0], 0.0);
        assert!(default.gradient.iter().skip(1).all(|&v| v > 0.0));
    }

    #[test]
    fn filter_elements_follow_spin_structure() {
        let fal = Filters::new()
            .with(FilterChannel::T, array![1.0, 2.0])
            .with(FilterChannel::E, array![4.0, 4.0])
            .with(FilterChannel::B, array![2.0, 0.0]);
        assert_eq!(filter_element(0, 0, &fal).unwrap(), Some(array![1.0, 2.0]));
        assert_eq!(filter_element(0, 2, &fal).unwrap(), None);
        assert_eq!(filter_element(2, 2, &fal).unwrap(), Some(array![3.0, 2.0]));
        assert_eq!(filter_element(-2, 2, &fal).unwrap(), Some(array![1.0, 2.0]));
        assert_eq!(filter_element(1, 2, &fal), Err(EstimatorError::InvalidSpin { spin: 1 }));
    }

    #[test]
    fn short_filters_are_rejected() {
        let kernel = ConvolutionKernel::default();
        let cls = cmb(6);
        let fal = filters(3, 0.1);
        let err = get_response_sep_tp(
            &kernel, EstimatorKey::Ptt, 6, SourceKey::Lensing, &cls, &cls, &fal, None, None,
        )
        .unwrap_err();
        assert!(matches!(err, EstimatorError::SequenceTooShort { required: 7, actual: 4, .. }));
    }

    #[test]
    fn modulation_response_has_no_curl() {
        let kernel = ConvolutionKernel::default();
        let cls = cmb(4);
        let fal = filters(4, 0.1);
        let resp = get_response_sep_tp(
            &kernel, EstimatorKey::Ftt, 4, SourceKey::Modulation, &cls, &cls, &fal, None, None,
        )
        .unwrap();
        assert!(resp.curl.iter().all(|&v| v == 0.0));
        assert!(resp.gradient[0] > 0.0);
    }
}
