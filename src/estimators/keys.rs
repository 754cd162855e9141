//! Estimator and anisotropy-source keys.
//!
//! Short codes such as `"ptt"` or `"p_p"` are parsed once into closed enums
//! at the API boundary; everything downstream matches on variants.
//!
//! Estimators:
//! - `ptt` / `xtt`: temperature-only lensing gradient / curl.
//! - `p_p` / `x_p`: polarization-only lensing gradient / curl.
//! - `p` / `x`: minimum-variance (T+P) lensing gradient / curl.
//! - `ftt`: temperature modulation.
//! - `stt`: temperature point-source power.
//!
//! Sources: `p` (lensing), `f` (modulation), `stt` (point-source power).
use crate::estimators::errors::EstimatorError;
use std::str::FromStr;

/// Quadratic estimator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorKey {
    Ptt,
    Xtt,
    PP,
    XP,
    P,
    X,
    Ftt,
    Stt,
}

/// Leading-letter family of an estimator key.
///
/// Estimators of different families have no Gaussian cross-noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorFamily {
    LensingGradient,
    LensingCurl,
    Modulation,
    PointSource,
}

impl EstimatorKey {
    pub const ALL: [EstimatorKey; 8] = [
        EstimatorKey::Ptt,
        EstimatorKey::Xtt,
        EstimatorKey::PP,
        EstimatorKey::XP,
        EstimatorKey::P,
        EstimatorKey::X,
        EstimatorKey::Ftt,
        EstimatorKey::Stt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKey::Ptt => "ptt",
            EstimatorKey::Xtt => "xtt",
            EstimatorKey::PP => "p_p",
            EstimatorKey::XP => "x_p",
            EstimatorKey::P => "p",
            EstimatorKey::X => "x",
            EstimatorKey::Ftt => "ftt",
            EstimatorKey::Stt => "stt",
        }
    }

    pub fn family(&self) -> EstimatorFamily {
        match self {
            EstimatorKey::Ptt | EstimatorKey::PP | EstimatorKey::P => {
                EstimatorFamily::LensingGradient
            }
            EstimatorKey::Xtt | EstimatorKey::XP | EstimatorKey::X => EstimatorFamily::LensingCurl,
            EstimatorKey::Ftt => EstimatorFamily::Modulation,
            EstimatorKey::Stt => EstimatorFamily::PointSource,
        }
    }

    /// True for curl-mode (`x…`) estimators, whose primary output is `C`.
    pub fn is_curl(&self) -> bool {
        self.family() == EstimatorFamily::LensingCurl
    }

    /// Key with the family letter stripped (`"ptt"` → `"tt"`, `"p"` → `""`).
    ///
    /// Gradient and curl variants share the label, and hence cache entries.
    pub fn label(&self) -> &'static str {
        &self.as_str()[1..]
    }
}

impl FromStr for EstimatorKey {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EstimatorKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EstimatorError::UnknownEstimator { key: s.to_string() })
    }
}

impl std::fmt::Display for EstimatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anisotropy source whose response is being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// Lensing deflection (gradient and curl), spin 1.
    Lensing,
    /// Amplitude modulation, spin 0.
    Modulation,
    /// Point-source power on the covariance diagonal, spin 0.
    PointSource,
}

impl SourceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Lensing => "p",
            SourceKey::Modulation => "f",
            SourceKey::PointSource => "stt",
        }
    }
}

impl FromStr for SourceKey {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p" => Ok(SourceKey::Lensing),
            "f" => Ok(SourceKey::Modulation),
            "stt" => Ok(SourceKey::PointSource),
            _ => Err(EstimatorError::UnknownSource { key: s.to_string() }),
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
