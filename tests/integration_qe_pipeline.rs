//! Integration tests for the quadratic-estimator response pipeline.
//!
//! Purpose
//! -------
//! - Validate the path from CMB spectra and isotropic filters, through
//!   estimator weights and the convolution kernel, to responses, N0 and
//!   mean-field responses.
//! - Exercise the persistent cache end to end against a real directory.
//!
//! Coverage
//! --------
//! - `response`: response/N0 identity under optimal filtering for the
//!   joint minimum-variance estimator, backend agreement, mean-field shape.
//! - `cache`: round trip through `npdb.db`, served without recomputation;
//!   refusal of a directory created for other inputs; cross-family zeros.
//!
//! Exclusions
//! ----------
//! - Per-function regression values; those live in the unit tests.
//! - Python bindings.
use approx::assert_relative_eq;
use ndarray::Array1;
use qe_response::{
    cache::{CacheError, NoiseLibrary, ResponseLibrary, SingleProcess},
    estimators::{EstimatorKey, FilterChannel, Filters, SourceKey, Spectra, SpectrumChannel},
    response::{get_mf_resp, get_nhl, get_response_sep_tp},
    transform::{
        BackendKind, ConvolutionKernel, QuadratureRule, TransformBackend, TransformError,
        TransformResult,
    },
};

const LMAX_QE: usize = 12;

/// Smooth toy CMB spectra with vanishing B modes.
fn cmb_spectra(lmax: usize) -> Spectra {
    let tt = Array1::from_shape_fn(lmax + 1, |l| 2.0 / (1.0 + 0.1 * (l * l) as f64));
    let ee = Array1::from_shape_fn(lmax + 1, |l| 0.05 * l as f64 / (1.0 + 0.02 * (l * l) as f64));
    let te = Array1::from_shape_fn(lmax + 1, |l| 0.1 / (1.0 + 0.05 * (l * l) as f64));
    Spectra::new()
        .with(SpectrumChannel::TT, tt)
        .with(SpectrumChannel::EE, ee)
        .with(SpectrumChannel::BB, Array1::zeros(lmax + 1))
        .with(SpectrumChannel::TE, te)
}

/// Diagonal inverse-variance filters and the matching filtered-map spectra.
fn optimal_filtering(cmb: &Spectra, lmax: usize) -> (Filters, Spectra) {
    let noise = Array1::from_shape_fn(lmax + 1, |l| 0.01 * (1.0 + 0.01 * (l * l) as f64));
    let tt = cmb.require(SpectrumChannel::TT).unwrap();
    let ee = cmb.require(SpectrumChannel::EE).unwrap();
    let ft = (&tt + &noise).mapv(|v| 1.0 / v);
    let fe = (&ee + &noise).mapv(|v| 1.0 / v);
    let fb = noise.mapv(|v| 1.0 / v);
    let fal = Filters::new()
        .with(FilterChannel::T, ft.clone())
        .with(FilterChannel::E, fe.clone())
        .with(FilterChannel::B, fb.clone());
    let ivfs = Spectra::new()
        .with(SpectrumChannel::TT, ft)
        .with(SpectrumChannel::EE, fe)
        .with(SpectrumChannel::BB, fb)
        .with(SpectrumChannel::TE, Array1::zeros(lmax + 1));
    (fal, ivfs)
}

/// Backend that refuses to build quadrature rules.
struct Refusing;

impl TransformBackend for Refusing {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn wigner_d(&self, _: usize, _: f64, _: i32, _: i32, out: &mut [f64]) {
        out.fill(f64::NAN);
    }

    fn quadrature_nodes(&self, _: usize) -> TransformResult<QuadratureRule> {
        Err(TransformError::BackendUnavailable {
            backend: "refusing",
            reason: "cache hits must not transform".to_string(),
        })
    }
}

#[test]
// Purpose
// -------
// Under optimal separate T/P filtering with weights equal to the CMB
// spectra, every estimator's response equals its N0, so the normalized
// noise is 1/R.
//
// Given
// -----
// - lmax_qe = 12, temperature and polarization with T-E correlation.
//
// Expect
// ------
// - R = N0 (gradient and curl) for ptt, p_p, p, xtt and ftt.
// - The lensing gradient response is positive for 2 ≤ L ≤ 2 lmax_qe.
fn response_equals_noise_under_optimal_filtering() {
    let cmb = cmb_spectra(LMAX_QE);
    let (fal, ivfs) = optimal_filtering(&cmb, LMAX_QE);
    let kernel = ConvolutionKernel::default();

    for (key, source) in [
        (EstimatorKey::Ptt, SourceKey::Lensing),
        (EstimatorKey::PP, SourceKey::Lensing),
        (EstimatorKey::P, SourceKey::Lensing),
        (EstimatorKey::Xtt, SourceKey::Lensing),
        (EstimatorKey::Ftt, SourceKey::Modulation),
    ] {
        let resp =
            get_response_sep_tp(&kernel, key, LMAX_QE, source, &cmb, &cmb, &fal, None, None)
                .unwrap();
        let n0 = get_nhl(&kernel, key, key, &cmb, &ivfs, LMAX_QE, None, None, None).unwrap();
        assert_eq!(resp.len(), 2 * LMAX_QE + 1);
        let scale =
            resp.gradient.iter().chain(resp.curl.iter()).fold(0.0f64, |m, v| m.max(v.abs()));
        let eps = 1e-10 * scale;
        for l in 0..resp.len() {
            let (g, c) = (resp.gradient[l], resp.curl[l]);
            assert_relative_eq!(g, n0.gradient[l], epsilon = eps, max_relative = 1e-8);
            assert_relative_eq!(c, n0.curl[l], epsilon = eps, max_relative = 1e-8);
        }
        if key == EstimatorKey::Ptt {
            assert!(resp.gradient.iter().skip(2).all(|&r| r > 0.0));
        }
    }
}

#[test]
fn backends_agree_on_a_full_response() {
    let cmb = cmb_spectra(LMAX_QE);
    let (fal, _) = optimal_filtering(&cmb, LMAX_QE);
    let fast = ConvolutionKernel::new(BackendKind::Recurrence);
    let reference = ConvolutionKernel::new("Jacobi".parse().unwrap());
    let run = |kernel: &ConvolutionKernel| {
        get_response_sep_tp(
            kernel,
            EstimatorKey::P,
            LMAX_QE,
            SourceKey::Lensing,
            &cmb,
            &cmb,
            &fal,
            None,
            None,
        )
        .unwrap()
    };
    let (a, b) = (run(&fast), run(&reference));
    let scale = a.gradient.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    for l in 0..a.len() {
        assert_relative_eq!(a.gradient[l], b.gradient[l], epsilon = 1e-10 * scale);
        assert_relative_eq!(a.curl[l], b.curl[l], epsilon = 1e-10 * scale);
    }
}

#[test]
fn mean_field_responses_are_finite_and_pinned_at_low_degree() {
    let cmb = cmb_spectra(LMAX_QE + 4);
    let (_, ivfs) = optimal_filtering(&cmb_spectra(LMAX_QE), LMAX_QE);
    let kernel = ConvolutionKernel::default();
    for key in [EstimatorKey::Ptt, EstimatorKey::PP] {
        let mf = get_mf_resp(&kernel, key, &cmb, &ivfs, LMAX_QE, 2 * LMAX_QE).unwrap();
        assert_eq!(mf.len(), 2 * LMAX_QE + 1);
        assert!(mf.gradient.iter().chain(mf.curl.iter()).all(|v| v.is_finite()));
        assert_eq!(mf.gradient[0], 0.0);
        assert_eq!(mf.curl[1], 0.0);
    }
}

#[test]
// Purpose
// -------
// A response computed into a fresh directory is served, bit for bit, by a
// second library opened on the same directory whose kernel cannot
// transform at all.
fn cache_round_trip_serves_stored_values_without_recomputation() {
    let dir = tempfile::tempdir().unwrap();
    let cmb = cmb_spectra(LMAX_QE);
    let (fal, ivfs) = optimal_filtering(&cmb, LMAX_QE);
    let lmax_qlm = 2 * LMAX_QE;

    let mut first = ResponseLibrary::open(
        dir.path(),
        LMAX_QE,
        cmb.clone(),
        cmb.clone(),
        fal.clone(),
        lmax_qlm,
        &SingleProcess,
        ConvolutionKernel::default(),
    )
    .unwrap();
    let g = first.get_response(EstimatorKey::Ptt, SourceKey::Lensing, false).unwrap();
    let c = first.get_response(EstimatorKey::Xtt, SourceKey::Lensing, false).unwrap();
    drop(first);

    let mut second = ResponseLibrary::open(
        dir.path(),
        LMAX_QE,
        cmb.clone(),
        cmb.clone(),
        fal,
        lmax_qlm,
        &SingleProcess,
        ConvolutionKernel::with_backend(Box::new(Refusing)),
    )
    .unwrap();
    let g2 = second.get_response(EstimatorKey::Ptt, SourceKey::Lensing, false).unwrap();
    let c2 = second.get_response(EstimatorKey::Xtt, SourceKey::Lensing, false).unwrap();
    assert!(g.iter().zip(g2.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
    assert!(c.iter().zip(c2.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
    assert!(second.get_response(EstimatorKey::Ptt, SourceKey::Modulation, false).is_err());

    let nhl_dir = dir.path().join("nhl");
    let mut noise = NoiseLibrary::open(
        &nhl_dir,
        LMAX_QE,
        cmb.clone(),
        ivfs,
        &SingleProcess,
        ConvolutionKernel::default(),
    )
    .unwrap();
    let n0 = noise.get_nhl(EstimatorKey::Ptt, EstimatorKey::Ptt, false).unwrap();
    for l in 0..n0.len() {
        let eps = 1e-10 * g[1].abs().max(1.0);
        assert_relative_eq!(n0[l], g[l], epsilon = eps, max_relative = 1e-8);
    }
    assert_eq!(
        noise.get_nhl(EstimatorKey::Ptt, EstimatorKey::Ftt, false).unwrap(),
        Array1::<f64>::zeros(2 * LMAX_QE + 1)
    );
}

#[test]
fn cache_directory_rejects_changed_spectra() {
    let dir = tempfile::tempdir().unwrap();
    let cmb = cmb_spectra(LMAX_QE);
    let (fal, _) = optimal_filtering(&cmb, LMAX_QE);
    ResponseLibrary::open(
        dir.path(),
        LMAX_QE,
        cmb.clone(),
        cmb.clone(),
        fal.clone(),
        2 * LMAX_QE,
        &SingleProcess,
        ConvolutionKernel::default(),
    )
    .unwrap();

    let mut tt = cmb.require(SpectrumChannel::TT).unwrap().to_owned();
    tt[7] *= 1.0 + 1e-12;
    let changed = cmb.clone().with(SpectrumChannel::TT, tt);
    let err = ResponseLibrary::open(
        dir.path(),
        LMAX_QE,
        cmb,
        changed,
        fal,
        2 * LMAX_QE,
        &SingleProcess,
        ConvolutionKernel::default(),
    )
    .unwrap_err();
    match err {
        CacheError::HashMismatch { field, stored, current } => {
            assert_eq!(field, "clscmb tt");
            assert_ne!(stored, current);
        }
        other => panic!("expected a hash mismatch, got {other}"),
    }
}
