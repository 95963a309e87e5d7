//! Transcript tokenization against a character vocabulary.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Maps transcripts to token ids with a fixed character vocabulary.
#[derive(Debug, Clone)]
pub struct VocabularyFeaturizer {
    vocab_list: Vec<String>,
    vocab_dict: HashMap<String, i32>,
}

impl VocabularyFeaturizer {
    /// Load a vocabulary file with one token per line; the line index is the
    /// token id.
    pub fn from_file<P: AsRef<Path>>(vocab_path: P) -> Result<Self> {
        let content = fs::read_to_string(vocab_path.as_ref())?;
        let tokens: Vec<String> = content.lines().map(str::to_string).collect();
        let featurizer = Self::new(tokens)?;

        log::info!(
            "Loaded vocabulary with {} tokens from {:?}",
            featurizer.vocab_size(),
            vocab_path.as_ref()
        );
        Ok(featurizer)
    }

    pub fn new(vocab_list: Vec<String>) -> Result<Self> {
        if vocab_list.is_empty() {
            return Err(Error::Config("vocabulary is empty".into()));
        }
        let vocab_dict = vocab_list
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id as i32))
            .collect();
        Ok(Self {
            vocab_list,
            vocab_dict,
        })
    }

    /// Character-level token ids for `text`. Characters missing from the
    /// vocabulary are dropped.
    pub fn featurize(&self, text: &str) -> Vec<i32> {
        let mut buf = [0u8; 4];
        text.trim()
            .chars()
            .filter_map(|c| self.vocab_dict.get(&*c.encode_utf8(&mut buf)).copied())
            .collect()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_list.len()
    }

    pub fn vocab_list(&self) -> &[String] {
        &self.vocab_list
    }
}
