use std::path::PathBuf;
use std::time::Instant;

use speech_features::{DatasetConfig, SpeechDataset};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("configs/train.json"));

    println!("Loading config: {:?}", config_path);
    let config = DatasetConfig::from_file(&config_path)?;

    let load_start = Instant::now();
    let mut dataset = SpeechDataset::for_worker(&config, 0)?;
    println!(
        "Dataset with {} samples ready in {:.2?} (feature_dim={}, vocab_size={})",
        dataset.len(),
        load_start.elapsed(),
        dataset.feature_dim(),
        dataset.vocab_size()
    );

    let count = dataset.len().min(10);
    let featurize_start = Instant::now();
    for index in 0..count {
        let sample = dataset.get(index)?;
        let (dim, frames) = sample.feature.dim();
        println!(
            "[{}] {} x {} features, {} tokens",
            index,
            dim,
            frames,
            sample.tokens.len()
        );
    }

    if count > 0 {
        println!(
            "Featurized {} samples in {:.2?} ({:.2?} per sample)",
            count,
            featurize_start.elapsed(),
            featurize_start.elapsed() / count as u32
        );
    }

    Ok(())
}
