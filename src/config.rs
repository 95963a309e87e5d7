//! Configuration consumed by the featurizer and the dataset.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take the defaults below. Field names match the keys used in
//! existing training configs (`use_dB_normalization`, `target_dB`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::augment::AugmentationEntry;
use crate::error::Result;

/// Settings for [`SpectralFeaturizer`](crate::featurizer::SpectralFeaturizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// One of `linear`, `mfcc`, `fbank`.
    pub feature_method: String,
    pub stride_ms: f64,
    pub window_ms: f64,
    pub target_sample_rate: u32,
    #[serde(rename = "use_dB_normalization")]
    pub use_db_normalization: bool,
    #[serde(rename = "target_dB")]
    pub target_db: f64,
    /// Enables dithering for the mfcc and fbank methods.
    pub train_mode: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            feature_method: "linear".to_string(),
            stride_ms: 10.0,
            window_ms: 20.0,
            target_sample_rate: 16000,
            use_db_normalization: true,
            target_db: -20.0,
            train_mode: false,
        }
    }
}

/// Everything needed to build a [`SpeechDataset`](crate::dataset::SpeechDataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub manifest_path: PathBuf,
    pub vocab_path: PathBuf,
    pub mean_std_path: PathBuf,
    #[serde(flatten)]
    pub features: FeatureConfig,
    pub min_duration: f64,
    /// Upper duration bound in seconds; `-1` disables it.
    pub max_duration: f64,
    pub augmentation: Vec<AugmentationEntry>,
    /// Replacement draws allowed after a failed sample; `null` retries forever.
    pub max_retries: Option<usize>,
    /// Run seed. Without one, every generator is seeded from OS entropy.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("dataset/manifest.train"),
            vocab_path: PathBuf::from("dataset/vocabulary.txt"),
            mean_std_path: PathBuf::from("dataset/mean_std.json"),
            features: FeatureConfig::default(),
            min_duration: 0.0,
            max_duration: 20.0,
            augmentation: Vec::new(),
            max_retries: Some(100),
            seed: None,
        }
    }
}

impl DatasetConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Seed for worker `worker_id`, or `None` when no run seed is set.
    pub fn worker_seed(&self, worker_id: usize) -> Option<u64> {
        self.seed.map(|seed| worker_seed(seed, worker_id))
    }
}

/// Derive an independent generator seed for one worker from the run seed.
///
/// SplitMix64 finalizer over `run_seed + (worker_id + 1) * golden_gamma`.
pub fn worker_seed(run_seed: u64, worker_id: usize) -> u64 {
    let mut z = run_seed.wrapping_add((worker_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
