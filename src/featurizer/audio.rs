use std::fmt;
use std::str::FromStr;

use ndarray::{concatenate, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::delta::delta;
use super::kaldi::{self, KaldiOptions};
use super::spectrogram;
use crate::audio::Waveform;
use crate::config::FeatureConfig;
use crate::error::{Error, Result};

/// Mel filters used by the mfcc and fbank methods.
const N_MELS: usize = 161;
/// Frame shift in samples for mfcc/fbank, before conversion to milliseconds.
const N_SHIFT: usize = 160;
/// Frame length in samples for mfcc/fbank, before conversion to milliseconds.
const WIN_LENGTH: usize = 400;
const TRAIN_DITHER: f64 = 0.1;
const NUM_CEPS: usize = 13;
const DELTA_WINDOW: usize = 2;

/// Spectral feature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMethod {
    /// Log power spectrogram.
    Linear,
    /// Cepstral coefficients with first and second order deltas.
    Mfcc,
    /// Log mel filter-bank energies.
    Fbank,
}

impl FeatureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureMethod::Linear => "linear",
            FeatureMethod::Mfcc => "mfcc",
            FeatureMethod::Fbank => "fbank",
        }
    }

    /// Output rows for the default 16 kHz configuration.
    pub fn feature_dim(&self) -> usize {
        match self {
            FeatureMethod::Linear => 161,
            FeatureMethod::Mfcc => 3 * NUM_CEPS,
            FeatureMethod::Fbank => N_MELS,
        }
    }
}

impl FromStr for FeatureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(FeatureMethod::Linear),
            "mfcc" => Ok(FeatureMethod::Mfcc),
            "fbank" => Ok(FeatureMethod::Fbank),
            other => Err(Error::UnsupportedFeatureMethod(other.to_string())),
        }
    }
}

impl fmt::Display for FeatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature dimension for a method name.
///
/// # Errors
///
/// [`Error::UnsupportedFeatureMethod`] for anything but `linear`, `mfcc` and
/// `fbank`.
pub fn feature_dim(method: &str) -> Result<usize> {
    Ok(method.parse::<FeatureMethod>()?.feature_dim())
}

/// Extracts a `[feature_dim, num_frames]` matrix from a waveform.
///
/// Resampling and dB normalization are applied to the waveform in place
/// before extraction.
#[derive(Debug, Clone)]
pub struct SpectralFeaturizer {
    method: FeatureMethod,
    stride_ms: f64,
    window_ms: f64,
    target_sample_rate: u32,
    use_db_normalization: bool,
    target_db: f64,
    train_mode: bool,
    rng: StdRng,
}

impl SpectralFeaturizer {
    /// Build a featurizer with an entropy-seeded dither generator.
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        Self::with_seed(config, None)
    }

    /// Build a featurizer; `seed` makes training-mode dither reproducible.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unknown feature method or a zero target rate.
    pub fn with_seed(config: &FeatureConfig, seed: Option<u64>) -> Result<Self> {
        let method = config
            .feature_method
            .parse::<FeatureMethod>()
            .map_err(|e| Error::Config(e.to_string()))?;
        if config.target_sample_rate == 0 {
            return Err(Error::Config("target_sample_rate must be positive".into()));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            method,
            stride_ms: config.stride_ms,
            window_ms: config.window_ms,
            target_sample_rate: config.target_sample_rate,
            use_db_normalization: config.use_db_normalization,
            target_db: config.target_db,
            train_mode: config.train_mode,
            rng,
        })
    }

    pub fn method(&self) -> FeatureMethod {
        self.method
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Dither applied by the mfcc and fbank methods.
    pub fn dither(&self) -> f64 {
        if self.train_mode {
            TRAIN_DITHER
        } else {
            0.0
        }
    }

    /// Rows of the matrices this featurizer produces.
    pub fn feature_dim(&self) -> usize {
        match self.method {
            FeatureMethod::Linear => {
                let (_, window_size) = spectrogram::frame_sizes(
                    self.target_sample_rate,
                    self.stride_ms,
                    self.window_ms,
                );
                window_size / 2 + 1
            }
            method => method.feature_dim(),
        }
    }

    /// Extract features from `waveform`, resampling and normalizing it in
    /// place first.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedSampleRate`] when the waveform is not at the
    ///   target rate and the needed resampling direction is disallowed
    /// - [`Error::Gain`] when dB normalization needs an excessive gain
    /// - [`Error::InsufficientSamples`] when the audio is shorter than a frame
    pub fn featurize(
        &mut self,
        waveform: &mut Waveform,
        allow_downsampling: bool,
        allow_upsampling: bool,
    ) -> Result<Array2<f32>> {
        let rate = waveform.sample_rate();
        if (rate > self.target_sample_rate && allow_downsampling)
            || (rate < self.target_sample_rate && allow_upsampling)
        {
            waveform.resample(self.target_sample_rate)?;
        }
        if waveform.sample_rate() != self.target_sample_rate {
            return Err(Error::UnsupportedSampleRate {
                actual: waveform.sample_rate(),
                target: self.target_sample_rate,
            });
        }

        if self.use_db_normalization {
            waveform.normalize(self.target_db)?;
        }

        let feature = match self.method {
            FeatureMethod::Linear => spectrogram::compute_linear(
                waveform.samples(),
                waveform.sample_rate(),
                self.stride_ms,
                self.window_ms,
            )?,
            FeatureMethod::Mfcc => self.compute_mfcc(waveform)?,
            FeatureMethod::Fbank => self.compute_fbank(waveform)?,
        };
        Ok(feature.mapv(|v| v as f32))
    }

    fn kaldi_options(&self, sample_rate: u32) -> KaldiOptions {
        let points_per_ms = sample_rate as f64 / 1000.0;
        KaldiOptions {
            sample_rate,
            frame_length_ms: WIN_LENGTH as f64 / points_per_ms,
            frame_shift_ms: N_SHIFT as f64 / points_per_ms,
            n_mels: N_MELS,
            dither: self.dither(),
            energy_floor: 0.0,
            num_ceps: NUM_CEPS,
            ..Default::default()
        }
    }

    fn int16_samples(waveform: &Waveform) -> Vec<f64> {
        waveform.as_int16().into_iter().map(f64::from).collect()
    }

    fn compute_mfcc(&mut self, waveform: &Waveform) -> Result<Array2<f64>> {
        let opts = self.kaldi_options(waveform.sample_rate());
        let samples = Self::int16_samples(waveform);
        let ceps = kaldi::mfcc(&samples, &opts, &mut self.rng)?;

        let d_feat = delta(&ceps, DELTA_WINDOW)?;
        let dd_feat = delta(&d_feat, DELTA_WINDOW)?;
        let stacked = concatenate(Axis(1), &[ceps.view(), d_feat.view(), dd_feat.view()])?;
        Ok(stacked.reversed_axes())
    }

    fn compute_fbank(&mut self, waveform: &Waveform) -> Result<Array2<f64>> {
        let opts = self.kaldi_options(waveform.sample_rate());
        let samples = Self::int16_samples(waveform);
        Ok(kaldi::fbank(&samples, &opts, &mut self.rng)?.reversed_axes())
    }
}
