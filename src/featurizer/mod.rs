//! Feature extraction for audio and transcripts.
//!
//! - [`SpectralFeaturizer`] turns a [`Waveform`](crate::audio::Waveform) into a
//!   `[feature_dim, num_frames]` matrix using one of three methods:
//!   `linear` (log power spectrogram), `mfcc` (13 cepstra plus deltas, 39 rows)
//!   or `fbank` (161 log mel energies).
//! - [`VocabularyFeaturizer`] turns a transcript into token ids.

pub mod audio;
pub mod delta;
pub mod kaldi;
pub mod spectrogram;
pub mod text;

pub use audio::{feature_dim, FeatureMethod, SpectralFeaturizer};
pub use text::VocabularyFeaturizer;
