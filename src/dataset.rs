//! Manifest loading and end-to-end assembly of training samples.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::audio::{WavFileSource, WaveformSource};
use crate::augment::AugmentationPipeline;
use crate::config::DatasetConfig;
use crate::error::{Error, Result};
use crate::featurizer::{SpectralFeaturizer, VocabularyFeaturizer};
use crate::normalizer::FeatureNormalizer;
use crate::FeatureMatrix;

const DEFAULT_MAX_RETRIES: usize = 100;

/// One line of a manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub audio_filepath: String,
    pub text: String,
    /// Duration in seconds.
    pub duration: f64,
}

/// A manifest entry that passed the duration filter.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub audio_path: PathBuf,
    pub transcript: String,
}

/// Normalized features and token ids for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    /// `[feature_dim, num_frames]`
    pub feature: FeatureMatrix,
    pub tokens: Vec<i32>,
}

/// Parse every record of a JSON-lines manifest. Blank lines are skipped.
pub fn parse_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            line: line_no + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Keep entries with `duration >= min_duration` and, unless `max_duration`
/// is `-1`, `duration <= max_duration`. Order is preserved.
pub fn filter_by_duration(
    entries: Vec<ManifestEntry>,
    min_duration: f64,
    max_duration: f64,
) -> Vec<DataItem> {
    entries
        .into_iter()
        .filter(|entry| entry.duration >= min_duration)
        .filter(|entry| max_duration == -1.0 || entry.duration <= max_duration)
        .map(|entry| DataItem {
            audio_path: PathBuf::from(entry.audio_filepath),
            transcript: entry.text,
        })
        .collect()
}

/// Read a manifest and apply the duration filter.
pub fn read_manifest<P: AsRef<Path>>(
    path: P,
    min_duration: f64,
    max_duration: f64,
) -> Result<Vec<DataItem>> {
    let entries = parse_manifest(&path)?;
    let total = entries.len();
    let items = filter_by_duration(entries, min_duration, max_duration);
    log::info!(
        "Loaded {} of {} manifest entries from {:?} (duration {}..{})",
        items.len(),
        total,
        path.as_ref(),
        min_duration,
        max_duration
    );
    Ok(items)
}

/// The collaborators a dataset runs each sample through.
pub struct DatasetComponents {
    pub augmentation: AugmentationPipeline,
    pub featurizer: SpectralFeaturizer,
    pub normalizer: FeatureNormalizer,
    pub vocabulary: VocabularyFeaturizer,
}

/// Indexable collection of training samples.
///
/// `get` does all file I/O and numeric work synchronously. A sample that
/// fails to load or featurize is logged and replaced by a randomly drawn
/// one, up to `max_retries` times. Every instance owns its generators, so
/// parallel loaders should build one dataset per worker
/// (see [`SpeechDataset::for_worker`]).
pub struct SpeechDataset<S: WaveformSource = WavFileSource> {
    items: Vec<DataItem>,
    source: S,
    augmentation: AugmentationPipeline,
    featurizer: SpectralFeaturizer,
    normalizer: FeatureNormalizer,
    vocabulary: VocabularyFeaturizer,
    max_retries: Option<usize>,
    rng: StdRng,
}

impl SpeechDataset<WavFileSource> {
    /// Load the manifest, vocabulary and normalizer statistics named in
    /// `config`, seeding all generators from `config.seed`.
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        Self::build(config, config.seed)
    }

    /// Like [`from_config`](Self::from_config) but with generators seeded
    /// for worker `worker_id`, so parallel workers draw independent streams.
    pub fn for_worker(config: &DatasetConfig, worker_id: usize) -> Result<Self> {
        Self::build(config, config.worker_seed(worker_id))
    }

    fn build(config: &DatasetConfig, seed: Option<u64>) -> Result<Self> {
        let featurizer = SpectralFeaturizer::with_seed(&config.features, seed.map(|s| s.wrapping_add(1)))?;
        let augmentation = AugmentationPipeline::new(&config.augmentation, seed)?;
        let normalizer = FeatureNormalizer::from_file(&config.mean_std_path)?;
        if normalizer.dim() != featurizer.feature_dim() {
            return Err(Error::Config(format!(
                "statistics in {:?} have {} dims but {} features have {}",
                config.mean_std_path,
                normalizer.dim(),
                featurizer.method(),
                featurizer.feature_dim()
            )));
        }
        let vocabulary = VocabularyFeaturizer::from_file(&config.vocab_path)?;
        let items = read_manifest(
            &config.manifest_path,
            config.min_duration,
            config.max_duration,
        )?;

        let components = DatasetComponents {
            augmentation,
            featurizer,
            normalizer,
            vocabulary,
        };
        let dataset = SpeechDataset::new(items, WavFileSource, components)
            .with_max_retries(config.max_retries);
        Ok(match seed {
            Some(seed) => dataset.with_seed(seed.wrapping_add(2)),
            None => dataset,
        })
    }
}

impl<S: WaveformSource> SpeechDataset<S> {
    pub fn new(items: Vec<DataItem>, source: S, components: DatasetComponents) -> Self {
        Self {
            items,
            source,
            augmentation: components.augmentation,
            featurizer: components.featurizer,
            normalizer: components.normalizer,
            vocabulary: components.vocabulary,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            rng: StdRng::from_entropy(),
        }
    }

    /// Replacement draws allowed after a failure; `None` never gives up.
    pub fn with_max_retries(mut self, max_retries: Option<usize>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Seed the generator that picks replacement samples.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    pub fn feature_dim(&self) -> usize {
        self.featurizer.feature_dim()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.vocab_size()
    }

    pub fn vocab_list(&self) -> &[String] {
        self.vocabulary.vocab_list()
    }

    /// Assemble the sample at `index`.
    ///
    /// Failures are logged and masked by drawing a uniformly random
    /// replacement index (the failing one included).
    ///
    /// # Errors
    ///
    /// - [`Error::IndexOutOfRange`] for an index past the end
    /// - [`Error::SampleUnavailable`] once the retry budget is spent
    pub fn get(&mut self, index: usize) -> Result<TrainingSample> {
        if index >= self.items.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }

        let mut current = index;
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let err = match self.assemble(current) {
                Ok(sample) => return Ok(sample),
                Err(err) => err,
            };

            let item = &self.items[current];
            log::error!(
                "Sample {} ({:?}, {:?}) failed: {}",
                current,
                item.audio_path,
                item.transcript,
                err
            );

            if self.max_retries.is_some_and(|max| attempts > max) {
                log::warn!(
                    "Giving up on index {} after {} attempts",
                    index,
                    attempts
                );
                return Err(Error::SampleUnavailable { index, attempts });
            }
            current = self.rng.gen_range(0..self.items.len());
        }
    }

    fn assemble(&mut self, index: usize) -> Result<TrainingSample> {
        let item = &self.items[index];
        let mut waveform = self.source.load(&item.audio_path)?;
        self.augmentation.transform_audio(&mut waveform)?;
        let feature = self.featurizer.featurize(&mut waveform, true, true)?;
        let mut feature = self.normalizer.apply(feature)?;
        self.augmentation.transform_feature(&mut feature)?;
        let tokens = self.vocabulary.featurize(&item.transcript);
        Ok(TrainingSample { feature, tokens })
    }
}
