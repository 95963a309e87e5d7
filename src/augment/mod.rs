//! Waveform- and feature-level data augmentation.
//!
//! An [`AugmentationPipeline`] is built from a JSON list of
//! `{"type": ..., "params": {...}, "prob": ...}` entries:
//!
//! ```json
//! [
//!   {"type": "speed", "params": {"min_speed_rate": 0.9, "max_speed_rate": 1.1, "num_rates": 3}, "prob": 0.5},
//!   {"type": "shift", "params": {"min_shift_ms": -5, "max_shift_ms": 5}, "prob": 1.0},
//!   {"type": "specaug", "params": {"freq_mask_width": 10, "time_mask_width": 50}, "prob": 1.0}
//! ]
//! ```
//!
//! | type | stage | params |
//! |---|---|---|
//! | `shift` | waveform | `min_shift_ms`, `max_shift_ms` |
//! | `volume` | waveform | `min_gain_dBFS`, `max_gain_dBFS` |
//! | `speed` | waveform | `min_speed_rate`, `max_speed_rate`, `num_rates` |
//! | `resample` | waveform | `new_sample_rate` |
//! | `specaug` | feature | `freq_mask_width`, `time_mask_width`, `n_freq_masks`, `n_time_masks`, `max_time_ratio`, `replace_with_zero` |

pub mod resample;
pub mod shift;
pub mod spec_augment;
pub mod speed;
pub mod volume;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::error::{Error, Result};
use crate::FeatureMatrix;

pub use resample::ResampleAugmentor;
pub use shift::ShiftPerturbAugmentor;
pub use spec_augment::SpecAugmentor;
pub use speed::SpeedPerturbAugmentor;
pub use volume::VolumePerturbAugmentor;

/// One augmentation step.
///
/// A step implements the waveform capability, the feature capability, or
/// both. Capabilities it does not advertise are never called. Randomness
/// comes from the pipeline's generator; steps hold no mutable state.
pub trait AugmentationStep: Send {
    fn name(&self) -> &'static str;

    fn supports_audio(&self) -> bool {
        false
    }

    fn supports_feature(&self) -> bool {
        false
    }

    fn transform_audio(&self, _waveform: &mut Waveform, _rng: &mut StdRng) -> Result<()> {
        Ok(())
    }

    fn transform_feature(&self, _feature: &mut FeatureMatrix, _rng: &mut StdRng) -> Result<()> {
        Ok(())
    }
}

/// Configuration entry for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    /// Probability of applying the step to a given sample.
    #[serde(default = "default_prob")]
    pub prob: f64,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_prob() -> f64 {
    1.0
}

/// Deserialize a step's params, reporting failures as configuration errors.
pub(crate) fn parse_params<T: DeserializeOwned>(kind: &str, params: &serde_json::Value) -> Result<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| Error::Config(format!("invalid params for augmentation '{kind}': {e}")))
}

/// Resolve a configuration entry to a step.
pub fn build_step(entry: &AugmentationEntry) -> Result<Box<dyn AugmentationStep>> {
    let step: Box<dyn AugmentationStep> = match entry.kind.as_str() {
        "shift" => Box::new(ShiftPerturbAugmentor::from_params(&entry.params)?),
        "volume" => Box::new(VolumePerturbAugmentor::from_params(&entry.params)?),
        "speed" => Box::new(SpeedPerturbAugmentor::from_params(&entry.params)?),
        "resample" => Box::new(ResampleAugmentor::from_params(&entry.params)?),
        "specaug" => Box::new(SpecAugmentor::from_params(&entry.params)?),
        other => {
            return Err(Error::Config(format!("unknown augmentation type: {other}")));
        }
    };
    Ok(step)
}

struct ConfiguredStep {
    step: Box<dyn AugmentationStep>,
    prob: f64,
}

/// Ordered augmentation steps sharing one random generator.
///
/// Runs with the same seed and the same sequence of calls are reproducible.
/// The generator is owned by the pipeline, so concurrent workers each need
/// their own pipeline.
pub struct AugmentationPipeline {
    steps: Vec<ConfiguredStep>,
    rng: StdRng,
}

impl AugmentationPipeline {
    /// Build from parsed entries.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for unknown types, bad params or a `prob` outside
    /// `[0, 1]`.
    pub fn new(entries: &[AugmentationEntry], seed: Option<u64>) -> Result<Self> {
        let steps = entries
            .iter()
            .map(|entry| {
                if !(0.0..=1.0).contains(&entry.prob) {
                    return Err(Error::Config(format!(
                        "prob for augmentation '{}' must be in [0, 1], got {}",
                        entry.kind, entry.prob
                    )));
                }
                Ok(ConfiguredStep {
                    step: build_step(entry)?,
                    prob: entry.prob,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        if !steps.is_empty() {
            log::debug!(
                "Augmentation pipeline: {}",
                steps
                    .iter()
                    .map(|s| format!("{}@{}", s.step.name(), s.prob))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(Self { steps, rng })
    }

    /// Build from a JSON string. An empty string or `{}` yields an empty
    /// pipeline.
    pub fn from_json(config: &str, seed: Option<u64>) -> Result<Self> {
        let trimmed = config.trim();
        if trimmed.is_empty() || trimmed == "{}" {
            return Self::new(&[], seed);
        }
        let entries: Vec<AugmentationEntry> = serde_json::from_str(trimmed)
            .map_err(|e| Error::Config(format!("invalid augmentation config: {e}")))?;
        Self::new(&entries, seed)
    }

    /// A pipeline that leaves every input untouched.
    pub fn empty() -> Self {
        Self {
            steps: Vec::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply the waveform-level steps in order, in place.
    pub fn transform_audio(&mut self, waveform: &mut Waveform) -> Result<()> {
        for configured in self.steps.iter().filter(|s| s.step.supports_audio()) {
            if self.rng.gen::<f64>() < configured.prob {
                log::debug!("Applying {} to waveform", configured.step.name());
                configured.step.transform_audio(waveform, &mut self.rng)?;
            }
        }
        Ok(())
    }

    /// Apply the feature-level steps in order, in place.
    pub fn transform_feature(&mut self, feature: &mut FeatureMatrix) -> Result<()> {
        for configured in self.steps.iter().filter(|s| s.step.supports_feature()) {
            if self.rng.gen::<f64>() < configured.prob {
                log::debug!("Applying {} to features", configured.step.name());
                configured.step.transform_feature(feature, &mut self.rng)?;
            }
        }
        Ok(())
    }
}
