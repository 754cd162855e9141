//! Spin-space coupling and response-leg algebra.
//!
//! Purpose
//! -------
//! Express covariances and their linear responses between spin-weighted
//! fields `_sX_{lm}` built from T, E and B, using the convention
//! `_0X_{lm} = −T_{lm}` and `_{±2}X_{lm} = −(E ± iB)_{lm}`.
//!
//! Key behaviors
//! -------------
//! - [`coupling`]: `<_{s1}X_{lm} _{s2}X^*_{lm}>` from a [`Spectra`] set.
//! - [`raise_response`] / [`lower_response`]: eigenvalues of the spin
//!   raising and lowering operators on `_sY_{lm}`.
//! - [`response_legs`]: field response of a spin-`s` field to a source.
//! - [`covariance_response`]: response of the `(s1, s2)` covariance block.
//!
//! Conventions
//! -----------
//! - Spins are restricted to `{0, −2, 2}`; anything else is
//!   [`EstimatorError::InvalidSpin`].
//! - The sign conventions for spin-0 sources (modulation, point sources)
//!   are kept as established by the lensing case; their overall sign is a
//!   documented ambiguity.
use crate::estimators::{
    errors::{EstimatorError, EstimatorResult},
    keys::SourceKey,
    spectra::{Spectra, SpectrumChannel},
};
use ndarray::{Array1, Zip, s};

fn check_spin(spin: i32) -> EstimatorResult<()> {
    match spin {
        0 | 2 | -2 => Ok(()),
        _ => Err(EstimatorError::InvalidSpin { spin }),
    }
}

/// `(−1)^n`.
pub(crate) fn parity(n: i32) -> f64 {
    if n.rem_euclid(2) == 0 { 1.0 } else { -1.0 }
}

/// Coupling sequence `<_{s1}X _{s2}X^*>_l`.
///
/// - `s1 < 0` reduces to `(−1)^{s1+s2} · coupling(−s1, −s2)`.
/// - `s1 = 0`: `tt` if `s2 = 0`, else `−te`.
/// - `s1 = 2`: `−te` if `s2 = 0`, else `ee + sign(s2)·bb`.
///
/// # Errors
/// - [`EstimatorError::InvalidSpin`] for spins outside `{0, ±2}`.
/// - [`EstimatorError::MissingChannel`] if a needed channel is absent.
pub fn coupling(s1: i32, s2: i32, cls: &Spectra) -> EstimatorResult<Array1<f64>> {
    check_spin(s1)?;
    check_spin(s2)?;
    if s1 < 0 {
        return Ok(coupling(-s1, -s2, cls)? * parity(s1 + s2));
    }
    match (s1, s2) {
        (0, 0) => Ok(cls.require(SpectrumChannel::TT)?.to_owned()),
        (0, _) | (_, 0) => Ok(cls.require(SpectrumChannel::TE)?.mapv(|v| -v)),
        _ => {
            let ee = cls.require(SpectrumChannel::EE)?;
            let bb = cls.require(SpectrumChannel::BB)?;
            let n = ee.len().min(bb.len());
            let sign = f64::from(s2.signum());
            Ok(Zip::from(ee.slice(s![..n]))
                .and(bb.slice(s![..n]))
                .map_collect(|&e, &b| e + sign * b))
        }
    }
}

/// `+sqrt((l − s)(l + s + 1))` for `|s| ≤ l ≤ lmax`, zero below.
pub fn raise_response(s: i32, lmax: usize) -> Array1<f64> {
    let s_f = f64::from(s);
    let l_min = s.unsigned_abs() as usize;
    Array1::from_shape_fn(lmax + 1, |l| {
        if l < l_min {
            return 0.0;
        }
        let l = l as f64;
        ((l - s_f) * (l + s_f + 1.0)).sqrt()
    })
}

/// `−sqrt((l + s)(l − s + 1))` for `|s| ≤ l ≤ lmax`, zero below.
pub fn lower_response(s: i32, lmax: usize) -> Array1<f64> {
    let s_f = f64::from(s);
    let l_min = s.unsigned_abs() as usize;
    Array1::from_shape_fn(lmax + 1, |l| {
        if l < l_min {
            return 0.0;
        }
        let l = l as f64;
        -((l + s_f) * (l - s_f + 1.0)).sqrt()
    })
}

/// Linear response of a spin-`s` quantity to a spin-`r` source.
///
/// Fields
/// ------
/// - `r`: source spin (`≥ 0`).
/// - `plus`: response coefficients to the `+r` source component.
/// - `minus`: response coefficients to the `−r` source component.
/// - `cl_scale`: map from gradient/curl modes to the source potential,
///   `L = 0..=2 lmax` (e.g. `sqrt(L(L+1))` for lensing).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseLeg {
    pub r: i32,
    pub plus: Array1<f64>,
    pub minus: Array1<f64>,
    pub cl_scale: Array1<f64>,
}

/// Field response of a spin-`s` field to `source`, up to `lmax`.
///
/// - Lensing: `_sX → _sX − ½ α_1 ð _sX − ½ α_{−1} ð̄ _sX`, so `r = 1`,
///   `plus = −½ lower(s)`, `minus = −½ raise(s)`, `cl_scale = sqrt(L(L+1))`.
/// - Modulation: `_sX → _sX + f _sX`, so `r = 0`, both legs `½`, unit scale.
///
/// # Errors
/// - [`EstimatorError::InvalidSpin`] for `s` outside `{0, ±2}`.
/// - [`EstimatorError::NoResponseLegs`] for point sources.
pub fn response_legs(source: SourceKey, s: i32, lmax: usize) -> EstimatorResult<ResponseLeg> {
    check_spin(s)?;
    let lmax_cl = 2 * lmax;
    match source {
        SourceKey::Lensing => Ok(ResponseLeg {
            r: 1,
            plus: lower_response(s, lmax) * -0.5,
            minus: raise_response(s, lmax) * -0.5,
            cl_scale: Array1::from_shape_fn(lmax_cl + 1, |l| {
                let l = l as f64;
                (l * (l + 1.0)).sqrt()
            }),
        }),
        SourceKey::Modulation => Ok(ResponseLeg {
            r: 0,
            plus: Array1::from_elem(lmax + 1, 0.5),
            minus: Array1::from_elem(lmax + 1, 0.5),
            cl_scale: Array1::ones(lmax_cl + 1),
        }),
        SourceKey::PointSource => Err(EstimatorError::NoResponseLegs { source: source.as_str() }),
    }
}

/// Response of the `(s1, s2)` covariance block to `source`, up to `lmax`.
///
/// Lensing and modulation compose [`response_legs`] with
/// `coupling(s1, s2, cls)`. Point-source power perturbs only the
/// temperature diagonal: legs `¼` (four identical contributions) when
/// `s1 = s2 = 0`, identically zero otherwise.
///
/// # Errors
/// - [`EstimatorError::InvalidSpin`], [`EstimatorError::MissingChannel`].
/// - [`EstimatorError::SequenceTooShort`] if the coupling covers fewer than
///   `lmax + 1` degrees.
pub fn covariance_response(
    source: SourceKey, s1: i32, s2: i32, cls: &Spectra, lmax: usize,
) -> EstimatorResult<ResponseLeg> {
    match source {
        SourceKey::Lensing | SourceKey::Modulation => {
            let leg = response_legs(source, s1, lmax)?;
            let coupl = coupling(s1, s2, cls)?;
            if coupl.len() < lmax + 1 {
                return Err(EstimatorError::SequenceTooShort {
                    channel: "coupling",
                    required: lmax + 1,
                    actual: coupl.len(),
                });
            }
            let coupl = coupl.slice(s![..lmax + 1]);
            Ok(ResponseLeg {
                r: leg.r,
                plus: &leg.plus * &coupl,
                minus: &leg.minus * &coupl,
                cl_scale: leg.cl_scale,
            })
        }
        SourceKey::PointSource => {
            check_spin(s1)?;
            check_spin(s2)?;
            let on = if s1 == 0 && s2 == 0 { 1.0 } else { 0.0 };
            Ok(ResponseLeg {
                r: 0,
                plus: Array1::from_elem(lmax + 1, 0.25 * on),
                minus: Array1::from_elem(lmax + 1, 0.25 * on),
                cl_scale: Array1::from_elem(2 * lmax + 1, on),
            })
        }
    }
}
