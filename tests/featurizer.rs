use std::error::Error;
use std::f32::consts::PI;

use speech_features::featurizer::feature_dim;
use speech_features::{FeatureConfig, SpectralFeaturizer, Waveform};

fn tone(sample_rate: u32, seconds: f32) -> Result<Waveform, speech_features::Error> {
    let len = (sample_rate as f32 * seconds) as usize;
    let samples = (0..len)
        .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
        .collect();
    Waveform::new(samples, sample_rate)
}

fn config(method: &str) -> FeatureConfig {
    FeatureConfig {
        feature_method: method.to_string(),
        ..Default::default()
    }
}

#[test]
fn linear_features_have_161_bins_at_16k() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("linear"))?;
    let mut waveform = tone(16_000, 1.0)?;

    let feature = featurizer.featurize(&mut waveform, false, false)?;

    // (16000 - 320) / 160 + 1 frames of 20 ms every 10 ms
    assert_eq!(feature.dim(), (161, 99));
    assert_eq!(feature.nrows(), featurizer.feature_dim());
    assert!(feature.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn linear_bins_follow_window_length() -> Result<(), Box<dyn Error>> {
    let config = FeatureConfig {
        target_sample_rate: 8_000,
        window_ms: 32.0,
        ..config("linear")
    };
    let mut featurizer = SpectralFeaturizer::new(&config)?;
    assert_eq!(featurizer.feature_dim(), 129);

    let mut waveform = tone(8_000, 0.5)?;
    let feature = featurizer.featurize(&mut waveform, false, false)?;
    assert_eq!(feature.nrows(), 129);
    Ok(())
}

#[test]
fn mfcc_stacks_deltas() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("mfcc"))?;
    let mut waveform = tone(16_000, 1.0)?;

    let feature = featurizer.featurize(&mut waveform, false, false)?;

    assert_eq!(feature.dim(), (39, 98));
    assert_eq!(feature_dim("mfcc")?, feature.nrows());
    Ok(())
}

#[test]
fn fbank_has_161_filters() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("fbank"))?;
    let mut waveform = tone(16_000, 0.5)?;

    let feature = featurizer.featurize(&mut waveform, false, false)?;

    assert_eq!(feature.dim(), (161, 48));
    assert_eq!(feature_dim("fbank")?, feature.nrows());
    Ok(())
}

#[test]
fn rate_mismatch_without_permission_is_rejected() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("linear"))?;

    let mut low = tone(8_000, 0.5)?;
    assert!(matches!(
        featurizer.featurize(&mut low, false, false),
        Err(speech_features::Error::UnsupportedSampleRate {
            actual: 8_000,
            target: 16_000
        })
    ));
    assert_eq!(low.sample_rate(), 8_000);
    assert!(matches!(
        featurizer.featurize(&mut low, true, false),
        Err(speech_features::Error::UnsupportedSampleRate {
            actual: 8_000,
            target: 16_000
        })
    ));

    let mut high = tone(32_000, 0.5)?;
    assert!(matches!(
        featurizer.featurize(&mut high, false, true),
        Err(speech_features::Error::UnsupportedSampleRate {
            actual: 32_000,
            target: 16_000
        })
    ));
    Ok(())
}

#[test]
fn allowed_resampling_converts_in_place() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("linear"))?;
    let mut waveform = tone(8_000, 1.0)?;

    let feature = featurizer.featurize(&mut waveform, false, true)?;

    assert_eq!(waveform.sample_rate(), 16_000);
    assert_eq!(waveform.len(), 16_000);
    assert_eq!(feature.dim(), (161, 99));
    Ok(())
}

#[test]
fn db_normalization_rejects_silence() -> Result<(), Box<dyn Error>> {
    let mut featurizer = SpectralFeaturizer::new(&config("linear"))?;
    let mut silence = Waveform::new(vec![0.0; 16_000], 16_000)?;
    assert!(matches!(
        featurizer.featurize(&mut silence, false, false),
        Err(speech_features::Error::Gain { .. })
    ));

    let quiet = FeatureConfig {
        use_db_normalization: false,
        ..config("linear")
    };
    let mut featurizer = SpectralFeaturizer::new(&quiet)?;
    let mut silence = Waveform::new(vec![0.0; 16_000], 16_000)?;
    assert!(featurizer.featurize(&mut silence, false, false).is_ok());
    Ok(())
}

#[test]
fn seeded_dither_is_reproducible() -> Result<(), Box<dyn Error>> {
    let train = FeatureConfig {
        train_mode: true,
        ..config("fbank")
    };
    let mut first = SpectralFeaturizer::with_seed(&train, Some(7))?;
    let mut second = SpectralFeaturizer::with_seed(&train, Some(7))?;

    let a = first.featurize(&mut tone(16_000, 0.25)?, false, false)?;
    let b = second.featurize(&mut tone(16_000, 0.25)?, false, false)?;
    assert_eq!(a, b);

    let mut other = SpectralFeaturizer::with_seed(&train, Some(8))?;
    let c = other.featurize(&mut tone(16_000, 0.25)?, false, false)?;
    assert_ne!(a, c);
    Ok(())
}

#[test]
fn too_short_audio_is_reported() -> Result<(), Box<dyn Error>> {
    let config = FeatureConfig {
        use_db_normalization: false,
        ..config("linear")
    };
    let mut featurizer = SpectralFeaturizer::new(&config)?;
    let mut waveform = Waveform::new(vec![0.1; 100], 16_000)?;
    assert!(matches!(
        featurizer.featurize(&mut waveform, false, false),
        Err(speech_features::Error::InsufficientSamples {
            needed: 320,
            actual: 100
        })
    ));
    Ok(())
}
