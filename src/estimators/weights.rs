//! Quadratic-estimator weight builder.
//!
//! Purpose
//! -------
//! Enumerate the [`QuadraticTerm`]s of an estimator. The weights act on the
//! inverse-variance filtered spin fields `_s X̄_{lm}` (with `_0X = −T`).
//!
//! Key behaviors
//! -------------
//! - Lensing (`ptt`/`xtt`, `p_p`/`x_p`, `p`/`x`) rescales outputs by
//!   `−sqrt(L(L+1))` for `L ≤ 2 lmax`; gradient and curl share weights.
//! - `p_p` assumes a vanishing B-mode weighting spectrum.
//! - Modulation (`ftt`) and point-source (`stt`) estimators use unit output
//!   rescaling.
use crate::estimators::{
    errors::{EstimatorError, EstimatorResult},
    keys::EstimatorKey,
    legs::{QeLeg, QuadraticTerm},
    spectra::{Spectra, SpectrumChannel},
};
use ndarray::Array1;

/// Quadratic terms of `key` up to multipole `lmax`.
///
/// Parameters
/// ----------
/// - `key`: estimator.
/// - `lmax`: max multipole of the legs; outputs cover `0..=2 lmax`.
/// - `cls_weight`: spectra entering the weights; every channel used must
///   cover `lmax + 1` degrees.
///
/// Errors
/// ------
/// - [`EstimatorError::MissingChannel`] / [`EstimatorError::SequenceTooShort`].
/// - [`EstimatorError::NotImplemented`] for `p_p`-type keys with non-zero
///   `bb` weights.
pub fn estimator_weights(
    key: EstimatorKey, lmax: usize, cls_weight: &Spectra,
) -> EstimatorResult<Vec<QuadraticTerm>> {
    match key {
        EstimatorKey::Ptt | EstimatorKey::Xtt => temperature_lensing(lmax, cls_weight),
        EstimatorKey::PP | EstimatorKey::XP => polarization_lensing(lmax, cls_weight),
        EstimatorKey::P | EstimatorKey::X => {
            let clte = cls_weight.require_up_to(SpectrumChannel::TE, lmax)?;
            let mut terms = temperature_lensing(lmax, cls_weight)?;
            terms.extend(polarization_lensing(lmax, cls_weight)?);
            let cl_out = lensing_rescaling(lmax);

            // Wiener-filtered T carries C^TE Ē.
            let g = &ell_factor(lmax) * &clte * -0.5;
            terms.push(QuadraticTerm::new(
                QeLeg::new(0, 0, Array1::ones(lmax + 1)),
                QeLeg::new(2, 1, g.clone()),
                cl_out.clone(),
            )?);
            terms.push(QuadraticTerm::new(
                QeLeg::new(0, 0, Array1::ones(lmax + 1)),
                QeLeg::new(-2, 1, g),
                cl_out.clone(),
            )?);

            // Wiener-filtered E carries C^TE T̄.
            terms.push(QuadraticTerm::new(
                QeLeg::new(2, 2, Array1::from_elem(lmax + 1, 0.5)),
                QeLeg::new(0, -1, &clip_sqrt(lmax, 2, -1) * &clte * -1.0),
                cl_out.clone(),
            )?);
            terms.push(QuadraticTerm::new(
                QeLeg::new(-2, -2, Array1::from_elem(lmax + 1, 0.5)),
                QeLeg::new(0, 3, &clip_sqrt(lmax, -2, 3) * &clte * -1.0),
                cl_out,
            )?);
            Ok(terms)
        }
        EstimatorKey::Ftt => {
            let cltt = cls_weight.require_up_to(SpectrumChannel::TT, lmax)?;
            Ok(vec![QuadraticTerm::new(
                QeLeg::new(0, 0, Array1::from_elem(lmax + 1, -1.0)),
                QeLeg::new(0, 0, cltt.mapv(|v| -v)),
                Array1::ones(2 * lmax + 1),
            )?])
        }
        EstimatorKey::Stt => Ok(vec![QuadraticTerm::new(
            QeLeg::new(0, 0, Array1::from_elem(lmax + 1, -1.0)),
            QeLeg::new(0, 0, Array1::from_elem(lmax + 1, -0.5)),
            Array1::ones(2 * lmax + 1),
        )?]),
    }
}

fn temperature_lensing(lmax: usize, cls_weight: &Spectra) -> EstimatorResult<Vec<QuadraticTerm>> {
    let cltt = cls_weight.require_up_to(SpectrumChannel::TT, lmax)?;
    Ok(vec![QuadraticTerm::new(
        QeLeg::new(0, 0, Array1::ones(lmax + 1)),
        QeLeg::new(0, 1, &ell_factor(lmax) * &cltt),
        lensing_rescaling(lmax),
    )?])
}

fn polarization_lensing(lmax: usize, cls_weight: &Spectra) -> EstimatorResult<Vec<QuadraticTerm>> {
    let clee = cls_weight.require_up_to(SpectrumChannel::EE, lmax)?;
    let clbb = cls_weight.require_up_to(SpectrumChannel::BB, lmax)?;
    if clbb.iter().any(|&v| v != 0.0) {
        return Err(EstimatorError::NotImplemented {
            reason: "polarization lensing weights with non-zero bb",
        });
    }
    let cl_out = lensing_rescaling(lmax);
    let half = Array1::from_elem(lmax + 1, 0.5);
    // E-part: G = −½ _2P − ½ _{−2}P.
    let f1 = &clip_sqrt(lmax, 2, -1) * &clee * 0.5;
    let f3 = &clip_sqrt(lmax, -2, 3) * &clee * 0.5;

    let mut terms = Vec::with_capacity(4);
    for (spin_a, spin_b, spin_out_b, weights) in
        [(2, 2, -1, &f1), (2, -2, -1, &f1), (-2, 2, 3, &f3), (-2, -2, 3, &f3)]
    {
        terms.push(QuadraticTerm::new(
            QeLeg::new(spin_a, spin_a, half.clone()),
            QeLeg::new(spin_b, spin_out_b, weights.clone()),
            cl_out.clone(),
        )?);
    }
    Ok(terms)
}

/// `sqrt(l(l+1))` for `l = 0..=lmax`.
fn ell_factor(lmax: usize) -> Array1<f64> {
    Array1::from_shape_fn(lmax + 1, |l| {
        let l = l as f64;
        (l * (l + 1.0)).sqrt()
    })
}

/// `−sqrt(L(L+1))` for `L = 0..=2 lmax`.
fn lensing_rescaling(lmax: usize) -> Array1<f64> {
    -ell_factor(2 * lmax)
}

/// `sqrt((l + a)(l + b))` where the product is positive, else zero.
fn clip_sqrt(lmax: usize, a: i64, b: i64) -> Array1<f64> {
    Array1::from_shape_fn(lmax + 1, |l| {
        let prod = (l as i64 + a) * (l as i64 + b);
        if prod > 0 { (prod as f64).sqrt() } else { 0.0 }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Term counts and spin layout per estimator.
    // - Explicit leg values for ptt and p_p.
    // - Failure paths: missing channels, short spectra, non-zero bb.
    // -------------------------------------------------------------------------

    fn weights(lmax: usize) -> Spectra {
        let n = lmax + 1;
        Spectra::new()
            .with(SpectrumChannel::TT, Array1::from_elem(n, 2.0))
            .with(SpectrumChannel::EE, Array1::from_elem(n, 0.5))
            .with(SpectrumChannel::BB, Array1::zeros(n))
            .with(SpectrumChannel::TE, Array1::from_elem(n, 0.1))
    }

    #[test]
    fn term_counts_per_estimator() {
        let cls = weights(4);
        let counts: Vec<usize> = EstimatorKey::ALL
            .iter()
            .map(|&k| estimator_weights(k, 4, &cls).unwrap().len())
            .collect();
        assert_eq!(counts, vec![1, 1, 4, 4, 9, 9, 1, 1]);
    }

    #[test]
    // Purpose
    // -------
    // ptt legs are (0,0,1) and (0,1, sqrt(l(l+1)) C^tt), output −sqrt(L(L+1)).
    fn temperature_lensing_legs() {
        let terms = estimator_weights(EstimatorKey::Ptt, 3, &weights(3)).unwrap();
        let term = &terms[0];
        assert_eq!((term.leg_a.spin_in, term.leg_a.spin_out), (0, 0));
        assert_eq!((term.leg_b.spin_in, term.leg_b.spin_out), (0, 1));
        assert_eq!(term.leg_a.cl, Array1::<f64>::ones(4));
        assert_relative_eq!(term.leg_b.cl[2], 6f64.sqrt() * 2.0, epsilon = 1e-15);
        assert_eq!(term.cl_out.len(), 7);
        assert_relative_eq!(term.cl_out[6], -42f64.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn polarization_lensing_legs() {
        let terms = estimator_weights(EstimatorKey::PP, 3, &weights(3)).unwrap();
        let spins: Vec<_> = terms
            .iter()
            .map(|t| (t.leg_a.spin_in, t.leg_a.spin_out, t.leg_b.spin_in, t.leg_b.spin_out))
            .collect();
        assert_eq!(spins, vec![(2, 2, 2, -1), (2, 2, -2, -1), (-2, -2, 2, 3), (-2, -2, -2, 3)]);
        // f1 = ½ sqrt((l+2)(l−1)) C^ee, zero at l ≤ 1.
        assert_eq!(terms[0].leg_b.cl[1], 0.0);
        assert_relative_eq!(terms[0].leg_b.cl[2], 0.5 * 2.0 * 0.5, epsilon = 1e-15);
        // f3 = ½ sqrt((l−2)(l+3)) C^ee, zero at l ≤ 2.
        assert_eq!(terms[2].leg_b.cl[2], 0.0);
        assert_relative_eq!(terms[2].leg_b.cl[3], 0.5 * 6f64.sqrt() * 0.5, epsilon = 1e-15);
    }

    #[test]
    fn nonzero_bb_weights_are_not_implemented() {
        let cls = weights(2).with(SpectrumChannel::BB, array![0.0, 0.0, 1e-3]);
        assert!(matches!(
            estimator_weights(EstimatorKey::XP, 2, &cls),
            Err(EstimatorError::NotImplemented { .. })
        ));
    }

    #[test]
    fn short_or_missing_weights_fail() {
        let cls = Spectra::new().with(SpectrumChannel::TT, array![1.0, 1.0]);
        assert_eq!(
            estimator_weights(EstimatorKey::Ptt, 3, &cls).unwrap_err(),
            EstimatorError::SequenceTooShort { channel: "tt", required: 4, actual: 2 }
        );
        assert_eq!(
            estimator_weights(EstimatorKey::P, 1, &cls).unwrap_err(),
            EstimatorError::MissingChannel { channel: "te" }
        );
    }

    #[test]
    fn point_source_weights_need_no_spectra() {
        let terms = estimator_weights(EstimatorKey::Stt, 2, &Spectra::new()).unwrap();
        assert_eq!(terms[0].leg_b.cl, array![-0.5, -0.5, -0.5]);
        assert_eq!(terms[0].cl_out, Array1::<f64>::ones(5));
    }
}
