//! Random time shift.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{parse_params, AugmentationStep};
use crate::audio::Waveform;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct ShiftParams {
    #[serde(default = "default_min_shift_ms")]
    min_shift_ms: f64,
    #[serde(default = "default_max_shift_ms")]
    max_shift_ms: f64,
}

fn default_min_shift_ms() -> f64 {
    -5.0
}

fn default_max_shift_ms() -> f64 {
    5.0
}

/// Shifts the waveform in time by a random number of milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftPerturbAugmentor {
    min_shift_ms: f64,
    max_shift_ms: f64,
}

impl ShiftPerturbAugmentor {
    pub fn new(min_shift_ms: f64, max_shift_ms: f64) -> Result<Self> {
        if !(min_shift_ms <= max_shift_ms) {
            return Err(Error::Config(format!(
                "shift range {min_shift_ms}..{max_shift_ms} ms is empty"
            )));
        }
        if !(max_shift_ms - min_shift_ms).is_finite() {
            return Err(Error::Config(format!(
                "shift range {min_shift_ms}..{max_shift_ms} ms is not finite"
            )));
        }
        Ok(Self {
            min_shift_ms,
            max_shift_ms,
        })
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let params: ShiftParams = parse_params("shift", params)?;
        Self::new(params.min_shift_ms, params.max_shift_ms)
    }
}

impl AugmentationStep for ShiftPerturbAugmentor {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn supports_audio(&self) -> bool {
        true
    }

    fn transform_audio(&self, waveform: &mut Waveform, rng: &mut StdRng) -> Result<()> {
        let shift_ms = rng.gen_range(self.min_shift_ms..=self.max_shift_ms);
        waveform.shift(shift_ms);
        Ok(())
    }
}
