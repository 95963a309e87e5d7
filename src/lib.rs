//! Turn waveform recordings and transcripts into normalized training tensors
//! for speech recognition.
//!
//! The flow for one sample is:
//!
//! ```text
//! WaveformSource::load -> AugmentationPipeline::transform_audio
//!   -> SpectralFeaturizer::featurize -> FeatureNormalizer::apply
//!   -> AugmentationPipeline::transform_feature -> VocabularyFeaturizer::featurize
//! ```
//!
//! [`SpeechDataset`] runs that flow per index and masks per-sample failures
//! by substituting another random sample.
//!
//! ```rust,no_run
//! use speech_features::{DatasetConfig, SpeechDataset};
//!
//! let config = DatasetConfig::from_file("configs/train.json")?;
//! let mut dataset = SpeechDataset::from_config(&config)?;
//! let sample = dataset.get(0)?;
//! println!("{:?} features, {} tokens", sample.feature.dim(), sample.tokens.len());
//! # Ok::<(), speech_features::Error>(())
//! ```

pub mod audio;
pub mod augment;
pub mod config;
pub mod dataset;
mod error;
pub mod featurizer;
pub mod normalizer;

pub use audio::{WavFileSource, Waveform, WaveformSource};
pub use augment::{AugmentationEntry, AugmentationPipeline, AugmentationStep};
pub use config::{DatasetConfig, FeatureConfig};
pub use dataset::{DataItem, DatasetComponents, ManifestEntry, SpeechDataset, TrainingSample};
pub use error::{Error, Result};
pub use featurizer::{FeatureMethod, SpectralFeaturizer, VocabularyFeaturizer};
pub use normalizer::FeatureNormalizer;

/// `[feature_dim, num_frames]` feature matrix.
pub type FeatureMatrix = ndarray::Array2<f32>;
