use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use speech_features::{
    dataset::read_manifest, FeatureConfig, FeatureNormalizer, SpectralFeaturizer, WavFileSource,
};

#[derive(Parser, Debug)]
#[command(
    about = "Compute per-dimension feature mean/std for normalization",
    version
)]
struct Args {
    /// JSON-lines manifest with audio_filepath, text and duration fields
    #[arg(long)]
    manifest: PathBuf,

    /// Where to write the statistics file
    #[arg(long, default_value = "dataset/mean_std.json")]
    output: PathBuf,

    /// Feature extraction method
    #[arg(long, value_enum, default_value_t = MethodChoice::Linear)]
    feature_method: MethodChoice,

    /// Number of randomly sampled utterances; 0 uses the whole manifest
    #[arg(long, default_value_t = 5000)]
    num_samples: usize,

    /// Seed for sample selection
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MethodChoice {
    Linear,
    Mfcc,
    Fbank,
}

impl MethodChoice {
    fn as_str(self) -> &'static str {
        match self {
            MethodChoice::Linear => "linear",
            MethodChoice::Mfcc => "mfcc",
            MethodChoice::Fbank => "fbank",
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let items = read_manifest(&args.manifest, 0.0, -1.0)?;
    let config = FeatureConfig {
        feature_method: args.feature_method.as_str().to_string(),
        ..Default::default()
    };
    let mut featurizer = SpectralFeaturizer::with_seed(&config, args.seed)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let num_samples = (args.num_samples > 0).then_some(args.num_samples);

    let normalizer = FeatureNormalizer::compute(
        &items,
        &WavFileSource,
        &mut featurizer,
        num_samples,
        &mut rng,
    )?;
    normalizer.save(&args.output)?;

    println!(
        "Wrote {} statistics ({} dims) to {:?}",
        normalizer.feature_method(),
        normalizer.dim(),
        args.output
    );
    Ok(())
}
