//! Waveform container and the audio operations the featurization pipeline
//! relies on.
//!
//! A [`Waveform`] is a mono buffer of `f32` samples in the range `[-1.0, 1.0]`
//! together with its sample rate. All transformations (resampling, gain,
//! loudness normalization, time shift, speed change) mutate the buffer in
//! place; each dataset item owns its waveform exclusively.

use std::path::Path;

use rubato::{FftFixedInOut, Resampler};

use crate::error::{Error, Result};

/// Largest gain `Waveform::normalize` will apply before giving up.
pub const MAX_GAIN_DB: f64 = 300.0;

/// Slowest speed rate `Waveform::change_speed` accepts (a 100x stretch).
pub const MIN_SPEED_RATE: f64 = 0.01;

const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Mono audio samples plus their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Create a waveform, rejecting empty buffers and a zero sample rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidWaveform("sample rate must be positive".into()));
        }
        if samples.is_empty() {
            return Err(Error::InvalidWaveform("waveform has no samples".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Load a waveform from a WAV file. See [`read_wav`].
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_wav(path.as_ref())
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Root-mean-square energy in decibels. Silence yields negative infinity.
    pub fn rms_db(&self) -> f64 {
        let mean_square = self
            .samples
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum::<f64>()
            / self.samples.len() as f64;
        10.0 * mean_square.log10()
    }

    /// Apply a gain in decibels.
    pub fn gain_db(&mut self, gain: f64) {
        let factor = 10f64.powf(gain / 20.0) as f32;
        for s in &mut self.samples {
            *s *= factor;
        }
    }

    /// Scale the waveform so its RMS level matches `target_db`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gain`] when the required gain exceeds [`MAX_GAIN_DB`],
    /// which is always the case for an all-zero buffer.
    pub fn normalize(&mut self, target_db: f64) -> Result<()> {
        let gain = target_db - self.rms_db();
        if gain.is_nan() || gain > MAX_GAIN_DB {
            return Err(Error::Gain {
                gain_db: gain,
                max_gain_db: MAX_GAIN_DB,
            });
        }
        self.gain_db(gain.min(MAX_GAIN_DB));
        Ok(())
    }

    /// Shift the content in time by `shift_ms` milliseconds.
    ///
    /// Positive values delay the signal (silence is inserted at the head),
    /// negative values advance it (silence is appended at the tail). The
    /// buffer length never changes; a shift longer than the waveform leaves
    /// only silence.
    pub fn shift(&mut self, shift_ms: f64) {
        let shift_samples = (shift_ms * self.sample_rate as f64 / 1000.0) as i64;
        let len = self.samples.len();
        let offset = (shift_samples.unsigned_abs() as usize).min(len);
        if offset == 0 {
            return;
        }
        if shift_samples > 0 {
            self.samples.copy_within(0..len - offset, offset);
            self.samples[..offset].fill(0.0);
        } else {
            self.samples.copy_within(offset..len, 0);
            self.samples[len - offset..].fill(0.0);
        }
    }

    /// Change playback speed by linear interpolation, without pitch
    /// correction. A rate above 1.0 shortens the waveform.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWaveform`] for a rate below [`MIN_SPEED_RATE`], a
    /// non-finite rate, or one that leaves no samples.
    pub fn change_speed(&mut self, speed_rate: f64) -> Result<()> {
        if speed_rate == 1.0 {
            return Ok(());
        }
        if !(speed_rate >= MIN_SPEED_RATE && speed_rate.is_finite()) {
            return Err(Error::InvalidWaveform(format!(
                "speed rate must be finite and at least {MIN_SPEED_RATE}, got {speed_rate}"
            )));
        }
        let old_length = self.samples.len();
        let new_length = (old_length as f64 / speed_rate) as usize;
        if new_length == 0 {
            return Err(Error::InvalidWaveform(format!(
                "speed rate {speed_rate} leaves no samples"
            )));
        }

        let step = if new_length > 1 {
            old_length as f64 / (new_length - 1) as f64
        } else {
            0.0
        };
        let last = old_length - 1;
        let stretched = (0..new_length)
            .map(|i| {
                let position = i as f64 * step;
                let left = position.floor() as usize;
                if left >= last {
                    return self.samples[last];
                }
                let frac = (position - left as f64) as f32;
                self.samples[left] * (1.0 - frac) + self.samples[left + 1] * frac
            })
            .collect();
        self.samples = stretched;
        Ok(())
    }

    /// Resample in place to `target_rate` using an FFT-based resampler.
    ///
    /// The resampler's group delay is compensated so the output stays aligned
    /// with the input, and the result has `round(len * target / source)`
    /// samples.
    pub fn resample(&mut self, target_rate: u32) -> Result<()> {
        if target_rate == 0 {
            return Err(Error::Resample("target sample rate must be positive".into()));
        }
        if target_rate == self.sample_rate {
            return Ok(());
        }

        log::debug!(
            "Resampling from {}Hz to {}Hz",
            self.sample_rate,
            target_rate
        );

        let mut resampler = FftFixedInOut::<f32>::new(
            self.sample_rate as usize,
            target_rate as usize,
            RESAMPLE_CHUNK_SIZE,
            1,
        )
        .map_err(|e| Error::Resample(format!("failed to create resampler: {}", e)))?;

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let expected = ((self.samples.len() as f64 * ratio).round() as usize).max(1);
        let delay = resampler.output_delay();
        let chunk_size = resampler.input_frames_next();

        let mut output = Vec::with_capacity(expected + delay + chunk_size);
        let mut chunks = self.samples.chunks(chunk_size);
        while output.len() < expected + delay {
            // Pad the last chunk, then keep flushing silence through the delay line.
            let mut input_chunk = chunks.next().map(<[f32]>::to_vec).unwrap_or_default();
            input_chunk.resize(chunk_size, 0.0);

            let result = resampler
                .process(&[input_chunk], None)
                .map_err(|e| Error::Resample(e.to_string()))?;
            if let Some(channel) = result.into_iter().next() {
                output.extend(channel);
            }
        }

        self.samples = output[delay..delay + expected].to_vec();
        self.sample_rate = target_rate;
        Ok(())
    }

    /// Convert to 16-bit PCM, scaling by `2^15` and clipping to the `i16`
    /// range.
    pub fn as_int16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}

/// Decodes audio files into [`Waveform`]s.
pub trait WaveformSource {
    fn load(&self, path: &Path) -> Result<Waveform>;
}

/// [`WaveformSource`] backed by WAV files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavFileSource;

impl WaveformSource for WavFileSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        read_wav(path)
    }
}

/// Read a WAV file into a mono [`Waveform`].
///
/// # Arguments
///
/// * `wav_path` - Path to the WAV file to read
///
/// # Returns
///
/// A waveform at the file's native sample rate. Integer PCM samples are
/// divided by `2^(bits - 1)`; float samples are kept as is. Multi-channel
/// audio is averaged down to one channel.
///
/// # Errors
///
/// This function will return an error if:
/// - The file cannot be opened or is not a valid WAV file
/// - The samples cannot be decoded
/// - The file contains no samples
///
/// # Examples
///
/// ```rust,no_run
/// use speech_features::audio::read_wav;
/// use std::path::Path;
///
/// let waveform = read_wav(Path::new("audio.wav"))?;
/// println!("Loaded {:.2}s at {} Hz", waveform.duration(), waveform.sample_rate());
/// # Ok::<(), speech_features::Error>(())
/// ```
pub fn read_wav(wav_path: &Path) -> Result<Waveform> {
    let reader = hound::WavReader::open(wav_path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    log::trace!(
        "Loading WAV {:?}: {}Hz, {} channels, {:?}",
        wav_path,
        spec.sample_rate,
        channels,
        spec.sample_format
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Waveform::new(mono, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Waveform {
        Waveform::new((1..=len).map(|i| i as f32 / 100.0).collect(), 1000).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_zero_rate() {
        assert!(Waveform::new(vec![], 16000).is_err());
        assert!(Waveform::new(vec![0.1], 0).is_err());
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let mut waveform = ramp(10);
        let original = waveform.clone();
        waveform.shift(0.0);
        assert_eq!(waveform, original);
    }

    #[test]
    fn test_positive_shift_delays() {
        // 1000 Hz: 3 ms == 3 samples
        let mut waveform = ramp(6);
        waveform.shift(3.0);
        assert_eq!(waveform.samples(), &[0.0, 0.0, 0.0, 0.01, 0.02, 0.03]);
    }

    #[test]
    fn test_negative_shift_advances() {
        let mut waveform = ramp(6);
        waveform.shift(-2.0);
        assert_eq!(waveform.samples(), &[0.03, 0.04, 0.05, 0.06, 0.0, 0.0]);
    }

    #[test]
    fn test_shift_beyond_duration_is_silence() {
        let mut waveform = ramp(4);
        waveform.shift(50.0);
        assert!(waveform.samples().iter().all(|&s| s == 0.0));
        assert_eq!(waveform.len(), 4);
    }

    #[test]
    fn test_normalize_reaches_target() {
        let mut waveform = Waveform::new(vec![0.5, -0.5, 0.5, -0.5], 16000).unwrap();
        waveform.normalize(-20.0).unwrap();
        assert!((waveform.rms_db() + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_silence_fails() {
        let mut waveform = Waveform::new(vec![0.0; 16], 16000).unwrap();
        assert!(matches!(waveform.normalize(-20.0), Err(Error::Gain { .. })));
    }

    #[test]
    fn test_change_speed_lengths() {
        let mut faster = ramp(100);
        faster.change_speed(2.0).unwrap();
        assert_eq!(faster.len(), 50);
        assert_eq!(faster.samples()[0], 0.01);

        let mut slower = ramp(100);
        slower.change_speed(0.5).unwrap();
        assert_eq!(slower.len(), 200);
        assert_eq!(slower.samples()[199], 1.0);
    }

    #[test]
    fn test_change_speed_rejects_extreme_rates() {
        for rate in [0.0, -1.0, 1e-12, f64::NAN, f64::INFINITY] {
            let mut waveform = ramp(100);
            assert!(matches!(
                waveform.change_speed(rate),
                Err(Error::InvalidWaveform(_))
            ));
            assert_eq!(waveform.len(), 100);
        }
    }

    #[test]
    fn test_as_int16_clips() {
        let waveform = Waveform::new(vec![1.0, -1.0, 0.5, 2.0], 16000).unwrap();
        assert_eq!(waveform.as_int16(), vec![32767, -32768, 16384, 32767]);
    }

    #[test]
    fn test_resample_length() {
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 8000.0).sin() * 0.5)
            .collect();
        let mut waveform = Waveform::new(samples, 8000).unwrap();
        waveform.resample(16000).unwrap();
        assert_eq!(waveform.sample_rate(), 16000);
        assert_eq!(waveform.len(), 16000);
    }
}
