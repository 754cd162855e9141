//! Immutable spectrum and filter channel sets.
//!
//! Purpose
//! -------
//! Hold the per-channel harmonic sequences an estimator is built from:
//! CMB / weighting / filtered spectra in [`Spectra`] (`tt`, `ee`, `bb`,
//! `te`) and isotropic inverse-variance filters in [`Filters`] (`t`, `e`,
//! `b`). Channels are optional; algebra that needs an absent channel fails
//! with [`EstimatorError::MissingChannel`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Values are owned and never mutated after construction; derived sets
//!   (truncations, products) are new values.
//! - Channel iteration order is fixed, so hashes of a set are reproducible.
use crate::estimators::errors::{EstimatorError, EstimatorResult};
use ndarray::{Array1, ArrayView1, s};

/// Spectrum channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumChannel {
    TT,
    EE,
    BB,
    TE,
}

impl SpectrumChannel {
    pub const ALL: [SpectrumChannel; 4] =
        [SpectrumChannel::TT, SpectrumChannel::EE, SpectrumChannel::BB, SpectrumChannel::TE];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpectrumChannel::TT => "tt",
            SpectrumChannel::EE => "ee",
            SpectrumChannel::BB => "bb",
            SpectrumChannel::TE => "te",
        }
    }
}

/// Filter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterChannel {
    T,
    E,
    B,
}

impl FilterChannel {
    pub const ALL: [FilterChannel; 3] = [FilterChannel::T, FilterChannel::E, FilterChannel::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterChannel::T => "t",
            FilterChannel::E => "e",
            FilterChannel::B => "b",
        }
    }
}

/// Set of spectra keyed by [`SpectrumChannel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectra {
    tt: Option<Array1<f64>>,
    ee: Option<Array1<f64>>,
    bb: Option<Array1<f64>>,
    te: Option<Array1<f64>>,
}

impl Spectra {
    pub fn new() -> Self {
        Spectra::default()
    }

    /// Builder-style insert, replacing any previous value of `channel`.
    pub fn with(mut self, channel: SpectrumChannel, cl: Array1<f64>) -> Self {
        *self.slot(channel) = Some(cl);
        self
    }

    fn slot(&mut self, channel: SpectrumChannel) -> &mut Option<Array1<f64>> {
        match channel {
            SpectrumChannel::TT => &mut self.tt,
            SpectrumChannel::EE => &mut self.ee,
            SpectrumChannel::BB => &mut self.bb,
            SpectrumChannel::TE => &mut self.te,
        }
    }

    pub fn get(&self, channel: SpectrumChannel) -> Option<ArrayView1<'_, f64>> {
        let cl = match channel {
            SpectrumChannel::TT => &self.tt,
            SpectrumChannel::EE => &self.ee,
            SpectrumChannel::BB => &self.bb,
            SpectrumChannel::TE => &self.te,
        };
        cl.as_ref().map(|c| c.view())
    }

    /// Channel view, or [`EstimatorError::MissingChannel`].
    pub fn require(&self, channel: SpectrumChannel) -> EstimatorResult<ArrayView1<'_, f64>> {
        self.get(channel).ok_or(EstimatorError::MissingChannel { channel: channel.as_str() })
    }

    /// First `lmax + 1` entries of `channel`.
    ///
    /// # Errors
    /// - [`EstimatorError::MissingChannel`] if absent.
    /// - [`EstimatorError::SequenceTooShort`] if it covers fewer degrees.
    pub fn require_up_to(
        &self, channel: SpectrumChannel, lmax: usize,
    ) -> EstimatorResult<ArrayView1<'_, f64>> {
        let cl = self.require(channel)?;
        if cl.len() < lmax + 1 {
            return Err(EstimatorError::SequenceTooShort {
                channel: channel.as_str(),
                required: lmax + 1,
                actual: cl.len(),
            });
        }
        Ok(cl.slice_move(s![..lmax + 1]))
    }

    /// Present channels in fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (SpectrumChannel, ArrayView1<'_, f64>)> {
        SpectrumChannel::ALL.into_iter().filter_map(move |ch| self.get(ch).map(|cl| (ch, cl)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Isotropic inverse-variance filters keyed by [`FilterChannel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    t: Option<Array1<f64>>,
    e: Option<Array1<f64>>,
    b: Option<Array1<f64>>,
}

impl Filters {
    pub fn new() -> Self {
        Filters::default()
    }

    pub fn with(mut self, channel: FilterChannel, fl: Array1<f64>) -> Self {
        match channel {
            FilterChannel::T => self.t = Some(fl),
            FilterChannel::E => self.e = Some(fl),
            FilterChannel::B => self.b = Some(fl),
        }
        self
    }

    pub fn get(&self, channel: FilterChannel) -> Option<ArrayView1<'_, f64>> {
        let fl = match channel {
            FilterChannel::T => &self.t,
            FilterChannel::E => &self.e,
            FilterChannel::B => &self.b,
        };
        fl.as_ref().map(|f| f.view())
    }

    pub fn require(&self, channel: FilterChannel) -> EstimatorResult<ArrayView1<'_, f64>> {
        self.get(channel).ok_or(EstimatorError::MissingChannel { channel: channel.as_str() })
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterChannel, ArrayView1<'_, f64>)> {
        FilterChannel::ALL.into_iter().filter_map(move |ch| self.get(ch).map(|fl| (ch, fl)))
    }

    /// Copy of every present channel cut to `lmax + 1` entries.
    ///
    /// # Errors
    /// - [`EstimatorError::SequenceTooShort`] if a present channel is shorter.
    pub fn truncated(&self, lmax: usize) -> EstimatorResult<Filters> {
        let mut out = Filters::new();
        for (ch, fl) in self.iter() {
            if fl.len() < lmax + 1 {
                return Err(EstimatorError::SequenceTooShort {
                    channel: ch.as_str(),
                    required: lmax + 1,
                    actual: fl.len(),
                });
            }
            out = out.with(ch, fl.slice(s![..lmax + 1]).to_owned());
        }
        Ok(out)
    }
}
