//! Kaldi-compatible filter-bank and MFCC extraction.
//!
//! Framing follows Kaldi's `snip_edges` convention: only complete frames are
//! produced. Each frame is optionally dithered, has its DC offset removed, is
//! pre-emphasized, multiplied by a povey window and zero-padded to the next
//! power of two before the FFT. Outputs are time-major, `[num_frames, dim]`.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use super::spectrogram::hann_window;
use crate::error::{Error, Result};

/// `f32::EPSILON`, the floor applied before every logarithm.
const EPSILON: f64 = f32::EPSILON as f64;

#[derive(Debug, Clone)]
pub struct KaldiOptions {
    pub sample_rate: u32,
    pub frame_length_ms: f64,
    pub frame_shift_ms: f64,
    pub n_mels: usize,
    /// Standard deviation of the Gaussian dither noise; 0 disables it.
    pub dither: f64,
    /// Floor for the log energy. Only consulted when `use_energy` is set.
    pub energy_floor: f64,
    pub use_energy: bool,
    pub preemphasis_coefficient: f64,
    pub low_freq: f64,
    /// Upper mel edge; values `<= 0` are offsets from Nyquist.
    pub high_freq: f64,
    pub num_ceps: usize,
    pub cepstral_lifter: f64,
}

impl Default for KaldiOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_length_ms: 25.0,
            frame_shift_ms: 10.0,
            n_mels: 23,
            dither: 0.0,
            energy_floor: 1.0,
            use_energy: false,
            preemphasis_coefficient: 0.97,
            low_freq: 20.0,
            high_freq: 0.0,
            num_ceps: 13,
            cepstral_lifter: 22.0,
        }
    }
}

impl KaldiOptions {
    /// `(window_shift, window_size, padded_window_size)` in samples.
    pub fn window_properties(&self) -> Result<(usize, usize, usize)> {
        let sample_rate = self.sample_rate as f64;
        let window_shift = (sample_rate * self.frame_shift_ms * 0.001).round() as usize;
        let window_size = (sample_rate * self.frame_length_ms * 0.001).round() as usize;
        if window_size < 2 || window_shift == 0 {
            return Err(Error::Config(format!(
                "frame length {} ms / shift {} ms too small at {} Hz",
                self.frame_length_ms, self.frame_shift_ms, self.sample_rate
            )));
        }
        Ok((window_shift, window_size, window_size.next_power_of_two()))
    }
}

/// Power spectra of all frames plus the raw log energy of each frame.
struct FramePowers {
    power: Array2<f64>,
    log_energy: Array1<f64>,
    padded_window_size: usize,
}

fn frame_powers<R: Rng + ?Sized>(
    samples: &[f64],
    opts: &KaldiOptions,
    rng: &mut R,
) -> Result<FramePowers> {
    let (window_shift, window_size, padded_window_size) = opts.window_properties()?;
    if samples.len() < window_size {
        return Err(Error::InsufficientSamples {
            needed: window_size,
            actual: samples.len(),
        });
    }
    let num_frames = 1 + (samples.len() - window_size) / window_shift;

    let window: Vec<f64> = hann_window(window_size)
        .into_iter()
        .map(|w| w.powf(0.85))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(padded_window_size);
    let num_bins = padded_window_size / 2 + 1;

    let mut power = Array2::<f64>::zeros((num_frames, num_bins));
    let mut log_energy = Array1::<f64>::zeros(num_frames);
    let mut frame = vec![0.0f64; window_size];
    let mut buffer = vec![Complex::new(0.0, 0.0); padded_window_size];

    for frame_idx in 0..num_frames {
        let start = frame_idx * window_shift;
        frame.copy_from_slice(&samples[start..start + window_size]);

        if opts.dither != 0.0 {
            for x in frame.iter_mut() {
                let noise: f64 = rng.sample(StandardNormal);
                *x += noise * opts.dither;
            }
        }

        let mean = frame.iter().sum::<f64>() / window_size as f64;
        for x in frame.iter_mut() {
            *x -= mean;
        }

        let energy = frame.iter().map(|x| x * x).sum::<f64>().max(EPSILON).ln();
        log_energy[frame_idx] = if opts.energy_floor > 0.0 {
            energy.max(opts.energy_floor.ln())
        } else {
            energy
        };

        if opts.preemphasis_coefficient != 0.0 {
            for i in (1..window_size).rev() {
                frame[i] -= opts.preemphasis_coefficient * frame[i - 1];
            }
            frame[0] -= opts.preemphasis_coefficient * frame[0];
        }

        for (slot, value) in buffer.iter_mut().enumerate() {
            *value = if slot < window_size {
                Complex::new(frame[slot] * window[slot], 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }

        fft.process(&mut buffer);

        for (k, c) in buffer.iter().take(num_bins).enumerate() {
            power[[frame_idx, k]] = c.norm_sqr();
        }
    }

    Ok(FramePowers {
        power,
        log_energy,
        padded_window_size,
    })
}

fn mel_scale(freq: f64) -> f64 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

/// Triangular mel filters, shape `[n_mels, padded_window_size / 2 + 1]`.
///
/// The Nyquist column is always zero, matching Kaldi.
pub fn mel_banks(
    n_mels: usize,
    padded_window_size: usize,
    sample_rate: u32,
    low_freq: f64,
    high_freq: f64,
) -> Result<Array2<f64>> {
    if n_mels < 3 {
        return Err(Error::Config(format!("need at least 3 mel bins, got {n_mels}")));
    }
    let num_fft_bins = padded_window_size / 2;
    let nyquist = 0.5 * sample_rate as f64;
    let high_freq = if high_freq <= 0.0 {
        high_freq + nyquist
    } else {
        high_freq
    };
    if !(0.0 <= low_freq && low_freq < high_freq && high_freq <= nyquist) {
        return Err(Error::Config(format!(
            "mel range {low_freq}..{high_freq} Hz invalid for Nyquist {nyquist} Hz"
        )));
    }

    let fft_bin_width = sample_rate as f64 / padded_window_size as f64;
    let mel_low = mel_scale(low_freq);
    let mel_high = mel_scale(high_freq);
    let mel_delta = (mel_high - mel_low) / (n_mels + 1) as f64;

    let mut banks = Array2::<f64>::zeros((n_mels, num_fft_bins + 1));
    for m in 0..n_mels {
        let left = mel_low + m as f64 * mel_delta;
        let center = left + mel_delta;
        let right = center + mel_delta;
        for k in 0..num_fft_bins {
            let mel = mel_scale(fft_bin_width * k as f64);
            let up = (mel - left) / (center - left);
            let down = (right - mel) / (right - center);
            banks[[m, k]] = up.min(down).max(0.0);
        }
    }
    Ok(banks)
}

/// Log mel filter-bank energies, shape `[num_frames, n_mels]` (plus a
/// leading energy column when `use_energy` is set).
pub fn fbank<R: Rng + ?Sized>(
    samples: &[f64],
    opts: &KaldiOptions,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let frames = frame_powers(samples, opts, rng)?;
    let banks = mel_banks(
        opts.n_mels,
        frames.padded_window_size,
        opts.sample_rate,
        opts.low_freq,
        opts.high_freq,
    )?;
    let mel = frames.power.dot(&banks.t()).mapv(|e| e.max(EPSILON).ln());

    if opts.use_energy {
        let energy = frames.log_energy.insert_axis(Axis(1));
        return Ok(ndarray::concatenate(Axis(1), &[energy.view(), mel.view()])?);
    }
    Ok(mel)
}

/// Orthonormal DCT-II basis, shape `[n_mels, num_ceps]`.
fn dct_matrix(n_mels: usize, num_ceps: usize) -> Array2<f64> {
    let n = n_mels as f64;
    Array2::from_shape_fn((n_mels, num_ceps), |(i, k)| {
        if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt() * (PI / n * (i as f64 + 0.5) * k as f64).cos()
        }
    })
}

fn lifter_coefficients(num_ceps: usize, cepstral_lifter: f64) -> Array1<f64> {
    Array1::from_shape_fn(num_ceps, |i| {
        1.0 + 0.5 * cepstral_lifter * (PI * i as f64 / cepstral_lifter).sin()
    })
}

/// Mel-frequency cepstral coefficients, shape `[num_frames, num_ceps]`.
pub fn mfcc<R: Rng + ?Sized>(
    samples: &[f64],
    opts: &KaldiOptions,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if opts.num_ceps == 0 || opts.num_ceps > opts.n_mels {
        return Err(Error::Config(format!(
            "num_ceps {} must be in 1..={}",
            opts.num_ceps, opts.n_mels
        )));
    }

    let frames = frame_powers(samples, opts, rng)?;
    let banks = mel_banks(
        opts.n_mels,
        frames.padded_window_size,
        opts.sample_rate,
        opts.low_freq,
        opts.high_freq,
    )?;
    let log_mel = frames.power.dot(&banks.t()).mapv(|e| e.max(EPSILON).ln());

    let mut ceps = log_mel.dot(&dct_matrix(opts.n_mels, opts.num_ceps));
    if opts.cepstral_lifter != 0.0 {
        ceps *= &lifter_coefficients(opts.num_ceps, opts.cepstral_lifter);
    }
    if opts.use_energy {
        ceps.column_mut(0).assign(&frames.log_energy);
    }
    Ok(ceps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tone(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 8000.0 * (2.0 * PI * 440.0 * i as f64 / 16000.0).sin())
            .collect()
    }

    fn options(n_mels: usize) -> KaldiOptions {
        KaldiOptions {
            n_mels,
            energy_floor: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_properties() {
        let (shift, size, padded) = options(23).window_properties().unwrap();
        assert_eq!((shift, size, padded), (160, 400, 512));
    }

    #[test]
    fn test_window_properties_round_to_nearest_sample() {
        let opts = KaldiOptions {
            sample_rate: 11025,
            ..options(23)
        };
        // 275.625 and 110.25 samples
        assert_eq!(opts.window_properties().unwrap(), (110, 276, 512));
    }

    #[test]
    fn test_mel_banks_are_triangular() {
        let banks = mel_banks(23, 512, 16000, 20.0, 0.0).unwrap();
        assert_eq!(banks.dim(), (23, 257));
        assert!(banks.column(256).iter().all(|&w| w == 0.0));
        for row in banks.rows() {
            assert!(row.iter().all(|&w| (0.0..=1.0).contains(&w)));
            assert!(row.iter().any(|&w| w > 0.0));
        }
    }

    #[test]
    fn test_fbank_frame_count() {
        let mut rng = StdRng::seed_from_u64(0);
        let feat = fbank(&tone(16000), &options(161), &mut rng).unwrap();
        // snip_edges: 1 + (16000 - 400) / 160
        assert_eq!(feat.dim(), (98, 161));
        assert!(feat.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mfcc_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let feat = mfcc(&tone(8000), &options(161), &mut rng).unwrap();
        assert_eq!(feat.dim(), (48, 13));
    }

    #[test]
    fn test_dither_changes_output() {
        let samples = tone(4000);
        let quiet = options(40);
        let noisy = KaldiOptions {
            dither: 1.0,
            ..options(40)
        };
        let mut rng = StdRng::seed_from_u64(7);
        let a = fbank(&samples, &quiet, &mut rng).unwrap();
        let b = fbank(&samples, &noisy, &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_energy_column() {
        let mut rng = StdRng::seed_from_u64(0);
        let opts = KaldiOptions {
            use_energy: true,
            ..options(23)
        };
        let feat = fbank(&tone(4000), &opts, &mut rng).unwrap();
        assert_eq!(feat.ncols(), 24);
    }

    #[test]
    fn test_short_signal_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            fbank(&[0.0; 100], &options(23), &mut rng),
            Err(Error::InsufficientSamples { needed: 400, .. })
        ));
    }
}
