//! Random gain perturbation.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{parse_params, AugmentationStep};
use crate::audio::Waveform;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct VolumeParams {
    #[serde(rename = "min_gain_dBFS", default = "default_min_gain")]
    min_gain_dbfs: f64,
    #[serde(rename = "max_gain_dBFS", default = "default_max_gain")]
    max_gain_dbfs: f64,
}

fn default_min_gain() -> f64 {
    -15.0
}

fn default_max_gain() -> f64 {
    15.0
}

/// Applies a random gain drawn uniformly in dBFS.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePerturbAugmentor {
    min_gain_dbfs: f64,
    max_gain_dbfs: f64,
}

impl VolumePerturbAugmentor {
    pub fn new(min_gain_dbfs: f64, max_gain_dbfs: f64) -> Result<Self> {
        if !(min_gain_dbfs <= max_gain_dbfs) {
            return Err(Error::Config(format!(
                "gain range {min_gain_dbfs}..{max_gain_dbfs} dBFS is empty"
            )));
        }
        if !(max_gain_dbfs - min_gain_dbfs).is_finite() {
            return Err(Error::Config(format!(
                "gain range {min_gain_dbfs}..{max_gain_dbfs} dBFS is not finite"
            )));
        }
        Ok(Self {
            min_gain_dbfs,
            max_gain_dbfs,
        })
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let params: VolumeParams = parse_params("volume", params)?;
        Self::new(params.min_gain_dbfs, params.max_gain_dbfs)
    }
}

impl AugmentationStep for VolumePerturbAugmentor {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn supports_audio(&self) -> bool {
        true
    }

    fn transform_audio(&self, waveform: &mut Waveform, rng: &mut StdRng) -> Result<()> {
        let gain = rng.gen_range(self.min_gain_dbfs..=self.max_gain_dbfs);
        waveform.gain_db(gain);
        Ok(())
    }
}
