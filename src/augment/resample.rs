//! Fixed-rate resampling.

use rand::rngs::StdRng;
use serde::Deserialize;

use super::{parse_params, AugmentationStep};
use crate::audio::Waveform;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct ResampleParams {
    new_sample_rate: u32,
}

/// Resamples the waveform to a fixed rate, simulating a different capture
/// device. The featurizer later resamples back to its target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleAugmentor {
    new_sample_rate: u32,
}

impl ResampleAugmentor {
    pub fn new(new_sample_rate: u32) -> Result<Self> {
        if new_sample_rate == 0 {
            return Err(Error::Config("new_sample_rate must be positive".into()));
        }
        Ok(Self { new_sample_rate })
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let params: ResampleParams = parse_params("resample", params)?;
        Self::new(params.new_sample_rate)
    }
}

impl AugmentationStep for ResampleAugmentor {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn supports_audio(&self) -> bool {
        true
    }

    fn transform_audio(&self, waveform: &mut Waveform, _rng: &mut StdRng) -> Result<()> {
        waveform.resample(self.new_sample_rate)
    }
}
