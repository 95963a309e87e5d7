//! SpecAugment-style frequency and time masking.

use ndarray::s;
use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{parse_params, AugmentationStep};
use crate::error::{Error, Result};
use crate::FeatureMatrix;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SpecAugmentParams {
    freq_mask_width: usize,
    time_mask_width: usize,
    n_freq_masks: usize,
    n_time_masks: usize,
    max_time_ratio: f64,
    replace_with_zero: bool,
}

impl Default for SpecAugmentParams {
    fn default() -> Self {
        Self {
            freq_mask_width: 10,
            time_mask_width: 50,
            n_freq_masks: 2,
            n_time_masks: 2,
            max_time_ratio: 1.0,
            replace_with_zero: false,
        }
    }
}

/// Frequency and time masking on a `[feature_dim, num_frames]` matrix.
///
/// Each frequency mask covers up to `freq_mask_width` consecutive rows, each
/// time mask up to `min(time_mask_width, max_time_ratio * num_frames)`
/// consecutive columns. Masked cells take zero or the matrix mean.
#[derive(Debug, Clone)]
pub struct SpecAugmentor {
    params: SpecAugmentParams,
}

impl SpecAugmentor {
    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let params: SpecAugmentParams = parse_params("specaug", params)?;
        if !(0.0..=1.0).contains(&params.max_time_ratio) {
            return Err(Error::Config(format!(
                "max_time_ratio must be in [0, 1], got {}",
                params.max_time_ratio
            )));
        }
        Ok(Self { params })
    }
}

impl AugmentationStep for SpecAugmentor {
    fn name(&self) -> &'static str {
        "specaug"
    }

    fn supports_feature(&self) -> bool {
        true
    }

    fn transform_feature(&self, feature: &mut FeatureMatrix, rng: &mut StdRng) -> Result<()> {
        let (dim, frames) = feature.dim();
        if dim == 0 || frames == 0 {
            return Ok(());
        }
        let fill = if self.params.replace_with_zero {
            0.0
        } else {
            feature.mean().unwrap_or(0.0)
        };

        let max_width = self.params.freq_mask_width.min(dim);
        for _ in 0..self.params.n_freq_masks {
            let width = rng.gen_range(0..=max_width);
            let start = rng.gen_range(0..=dim - width);
            feature.slice_mut(s![start..start + width, ..]).fill(fill);
        }

        let max_width = self
            .params
            .time_mask_width
            .min((self.params.max_time_ratio * frames as f64) as usize);
        for _ in 0..self.params.n_time_masks {
            let width = rng.gen_range(0..=max_width);
            let start = rng.gen_range(0..=frames - width);
            feature.slice_mut(s![.., start..start + width]).fill(fill);
        }
        Ok(())
    }
}
