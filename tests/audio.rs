use std::error::Error;

use speech_features::audio::read_wav;
use speech_features::{WavFileSource, WaveformSource};

fn int16_spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

#[test]
fn read_wav_scales_full_range() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("extreme.wav");

    {
        let mut writer = hound::WavWriter::create(&wav_path, int16_spec(1, 16_000))?;
        writer.write_sample(i16::MAX)?;
        writer.write_sample(i16::MIN)?;
        writer.write_sample(0i16)?;
        writer.finalize()?;
    }

    let waveform = read_wav(&wav_path)?;
    assert_eq!(waveform.sample_rate(), 16_000);
    assert_eq!(waveform.len(), 3);

    let samples = waveform.samples();
    assert_eq!(samples[0], 32767.0 / 32768.0);
    assert_eq!(samples[1], -1.0);
    assert_eq!(samples[2], 0.0);

    Ok(())
}

#[test]
fn read_wav_averages_channels() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("stereo.wav");

    {
        let mut writer = hound::WavWriter::create(&wav_path, int16_spec(2, 8_000))?;
        for (left, right) in [(16384i16, 0i16), (-16384, -16384), (8192, -8192)] {
            writer.write_sample(left)?;
            writer.write_sample(right)?;
        }
        writer.finalize()?;
    }

    let waveform = read_wav(&wav_path)?;
    assert_eq!(waveform.sample_rate(), 8_000);
    assert_eq!(waveform.samples(), &[0.25, -0.5, 0.0]);

    Ok(())
}

#[test]
fn read_wav_keeps_float_samples() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    {
        let mut writer = hound::WavWriter::create(&wav_path, spec)?;
        for sample in [0.125f32, -0.75, 0.5] {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    let waveform = WavFileSource.load(&wav_path)?;
    assert_eq!(waveform.samples(), &[0.125, -0.75, 0.5]);
    assert!((waveform.duration() - 3.0 / 22_050.0).abs() < 1e-12);

    Ok(())
}

#[test]
fn read_wav_rejects_missing_and_empty_files() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    assert!(read_wav(&temp_dir.path().join("missing.wav")).is_err());

    let empty_path = temp_dir.path().join("empty.wav");
    hound::WavWriter::create(&empty_path, int16_spec(1, 16_000))?.finalize()?;
    assert!(matches!(
        read_wav(&empty_path),
        Err(speech_features::Error::InvalidWaveform(_))
    ));

    let garbage_path = temp_dir.path().join("garbage.wav");
    std::fs::write(&garbage_path, b"not a riff file")?;
    assert!(matches!(
        read_wav(&garbage_path),
        Err(speech_features::Error::Wav(_))
    ));

    Ok(())
}
