//! Per-dimension mean/variance normalization of feature matrices.
//!
//! Statistics are stored as JSON:
//!
//! ```json
//! {"feature_method": "linear", "mean": [...], "std": [...]}
//! ```

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::audio::WaveformSource;
use crate::dataset::DataItem;
use crate::error::{Error, Result};
use crate::featurizer::SpectralFeaturizer;

const STD_EPSILON: f32 = 1e-20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeanStdFile {
    feature_method: String,
    mean: Vec<f32>,
    std: Vec<f32>,
}

/// Applies precomputed per-dimension normalization.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    feature_method: String,
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl FeatureNormalizer {
    pub fn new(feature_method: &str, mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::DimensionMismatch {
                expected: mean.len(),
                found: std.len(),
            });
        }
        Ok(Self {
            feature_method: feature_method.to_string(),
            mean: Array1::from(mean),
            std: Array1::from(std),
        })
    }

    /// A normalizer that leaves `dim`-row features unchanged.
    pub fn identity(feature_method: &str, dim: usize) -> Self {
        Self {
            feature_method: feature_method.to_string(),
            mean: Array1::zeros(dim),
            std: Array1::ones(dim),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let stats: MeanStdFile = serde_json::from_str(&content)?;
        log::info!(
            "Loaded {} feature statistics ({} dims) from {:?}",
            stats.feature_method,
            stats.mean.len(),
            path.as_ref()
        );
        Self::new(&stats.feature_method, stats.mean, stats.std)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let stats = MeanStdFile {
            feature_method: self.feature_method.clone(),
            mean: self.mean.to_vec(),
            std: self.std.to_vec(),
        };
        fs::write(path, serde_json::to_string(&stats)?)?;
        Ok(())
    }

    pub fn feature_method(&self) -> &str {
        &self.feature_method
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f32> {
        &self.std
    }

    /// Normalize a `[feature_dim, num_frames]` matrix row by row.
    pub fn apply(&self, mut feature: Array2<f32>) -> Result<Array2<f32>> {
        if feature.nrows() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                found: feature.nrows(),
            });
        }
        let mean = self.mean.view().insert_axis(Axis(1));
        let std = self.std.mapv(|s| s + STD_EPSILON).insert_axis(Axis(1));
        feature -= &mean;
        feature /= &std;
        Ok(feature)
    }

    /// Estimate statistics from up to `num_samples` randomly chosen items
    /// (all items when `None`).
    ///
    /// Items that fail to load or featurize are logged and skipped.
    pub fn compute<S, R>(
        items: &[DataItem],
        source: &S,
        featurizer: &mut SpectralFeaturizer,
        num_samples: Option<usize>,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: WaveformSource + ?Sized,
        R: Rng + ?Sized,
    {
        let sampled: Vec<&DataItem> = match num_samples {
            Some(n) if n < items.len() => items.choose_multiple(rng, n).collect(),
            _ => items.iter().collect(),
        };

        let dim = featurizer.feature_dim();
        let mut sum = Array1::<f64>::zeros(dim);
        let mut sum_sq = Array1::<f64>::zeros(dim);
        let mut frames = 0usize;

        for (i, item) in sampled.iter().enumerate() {
            let feature = source
                .load(&item.audio_path)
                .and_then(|mut waveform| featurizer.featurize(&mut waveform, true, true));
            let feature = match feature {
                Ok(feature) => feature,
                Err(err) => {
                    log::warn!("Skipping {:?}: {}", item.audio_path, err);
                    continue;
                }
            };
            if feature.nrows() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: feature.nrows(),
                });
            }
            let feature = feature.mapv(f64::from);
            sum += &feature.sum_axis(Axis(1));
            sum_sq += &feature.mapv(|v| v * v).sum_axis(Axis(1));
            frames += feature.ncols();

            if (i + 1) % 1000 == 0 {
                log::info!("Processed {}/{} samples", i + 1, sampled.len());
            }
        }

        if frames == 0 {
            return Err(Error::Config(
                "no features could be computed for mean/std statistics".into(),
            ));
        }

        let mean = &sum / frames as f64;
        let var = (&sum_sq / frames as f64 - &mean * &mean).mapv(|v| v.max(0.0));
        Self::new(
            featurizer.method().as_str(),
            mean.iter().map(|&v| v as f32).collect(),
            var.iter().map(|&v| v.sqrt() as f32).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_apply_standardizes_rows() {
        let normalizer = FeatureNormalizer::new("linear", vec![1.0, -2.0], vec![2.0, 4.0]).unwrap();
        let feature = array![[1.0f32, 3.0, 5.0], [-2.0, 2.0, -6.0]];
        let normalized = normalizer.apply(feature).unwrap();
        assert_eq!(normalized, array![[0.0f32, 1.0, 2.0], [0.0, 1.0, -1.0]]);
    }

    #[test]
    fn test_apply_rejects_wrong_dim() {
        let normalizer = FeatureNormalizer::identity("mfcc", 39);
        let feature = Array2::<f32>::zeros((13, 4));
        assert!(matches!(
            normalizer.apply(feature),
            Err(Error::DimensionMismatch {
                expected: 39,
                found: 13
            })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean_std.json");
        let normalizer = FeatureNormalizer::new("fbank", vec![0.5, 1.5], vec![1.0, 2.0]).unwrap();
        normalizer.save(&path).unwrap();

        let loaded = FeatureNormalizer::from_file(&path).unwrap();
        assert_eq!(loaded.feature_method(), "fbank");
        assert_eq!(loaded.mean(), normalizer.mean());
        assert_eq!(loaded.std(), normalizer.std());
    }
}
