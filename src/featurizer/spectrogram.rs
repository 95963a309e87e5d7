//! Linear log power spectrogram.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Floor added to the power spectrum before taking the logarithm.
pub const LOG_EPSILON: f64 = 1e-14;

/// Symmetric Hann window (`w[0] == w[n-1] == 0`).
pub fn hann_window(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Frame/window sizes in samples for a given rate and millisecond settings.
pub fn frame_sizes(sample_rate: u32, stride_ms: f64, window_ms: f64) -> (usize, usize) {
    let stride_size = (0.001 * sample_rate as f64 * stride_ms) as usize;
    let window_size = (0.001 * sample_rate as f64 * window_ms) as usize;
    (stride_size, window_size)
}

/// Log power spectrogram of `samples`, shape `[num_bins, num_frames]`.
///
/// Frames of `window_ms` advance by `stride_ms`. Samples past the last
/// complete stride are dropped, each frame is Hann-windowed and transformed
/// with an FFT of the window length, and the power is scaled so that a
/// one-sided spectrum integrates to the signal power. Only bins up to
/// Nyquist are kept.
pub fn compute_linear(
    samples: &[f32],
    sample_rate: u32,
    stride_ms: f64,
    window_ms: f64,
) -> Result<Array2<f64>> {
    let (stride_size, window_size) = frame_sizes(sample_rate, stride_ms, window_ms);
    if stride_size == 0 || window_size == 0 {
        return Err(Error::Config(format!(
            "stride {stride_ms} ms / window {window_ms} ms round to zero samples at {sample_rate} Hz"
        )));
    }
    if samples.len() < window_size {
        return Err(Error::InsufficientSamples {
            needed: window_size,
            actual: samples.len(),
        });
    }

    let truncate_size = (samples.len() - window_size) % stride_size;
    let samples = &samples[..samples.len() - truncate_size];
    let num_frames = (samples.len() - window_size) / stride_size + 1;

    let window = hann_window(window_size);
    let scale = window.iter().map(|w| w * w).sum::<f64>() * sample_rate as f64;

    let num_bins = window_size / 2 + 1;
    let bin_width = sample_rate as f64 / window_size as f64;
    let kept_bins = (0..num_bins)
        .take_while(|&k| bin_width * k as f64 <= sample_rate as f64 / 2.0)
        .count();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(window_size);
    let mut buffer = vec![Complex::new(0.0, 0.0); window_size];

    let mut spectrogram = Array2::<f64>::zeros((kept_bins, num_frames));
    for frame_idx in 0..num_frames {
        let start = frame_idx * stride_size;
        for (slot, (&s, &w)) in buffer
            .iter_mut()
            .zip(samples[start..start + window_size].iter().zip(window.iter()))
        {
            *slot = Complex::new(s as f64 * w, 0.0);
        }

        fft.process(&mut buffer);

        for k in 0..kept_bins {
            let power = buffer[k].norm_sqr();
            // Interior bins carry the energy of their negative-frequency mirror.
            let scaled = if k == 0 || k == num_bins - 1 {
                power / scale
            } else {
                power * 2.0 / scale
            };
            spectrogram[[k, frame_idx]] = (scaled + LOG_EPSILON).ln();
        }
    }

    Ok(spectrogram)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f64, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_hann_window_is_symmetric() {
        let window = hann_window(5);
        assert_eq!(window[0], 0.0);
        assert!((window[2] - 1.0).abs() < 1e-12);
        assert!((window[1] - window[3]).abs() < 1e-12);
    }

    #[test]
    fn test_shape_at_16k() {
        let samples = sine(16000, 440.0, 16000);
        let spec = compute_linear(&samples, 16000, 10.0, 20.0).unwrap();
        assert_eq!(spec.nrows(), 161);
        assert_eq!(spec.ncols(), (16000 - 320) / 160 + 1);
    }

    #[test]
    fn test_tail_is_truncated() {
        // 1000 samples: (1000 - 320) % 160 == 40 samples dropped
        let samples = sine(1000, 440.0, 16000);
        let spec = compute_linear(&samples, 16000, 10.0, 20.0).unwrap();
        assert_eq!(spec.ncols(), 5);
    }

    #[test]
    fn test_silence_hits_epsilon_floor() {
        let samples = vec![0.0f32; 640];
        let spec = compute_linear(&samples, 16000, 10.0, 20.0).unwrap();
        let floor = LOG_EPSILON.ln();
        assert!(spec.iter().all(|&v| v.is_finite() && (v - floor).abs() < 1e-9));
    }

    #[test]
    fn test_peak_at_tone_frequency() {
        // 1 kHz tone at 16 kHz with a 320-point FFT lands in bin 20 (50 Hz bins)
        let samples = sine(3200, 1000.0, 16000);
        let spec = compute_linear(&samples, 16000, 10.0, 20.0).unwrap();
        let column = spec.column(3);
        let peak = column
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(peak, 20);
    }

    #[test]
    fn test_too_short_input() {
        let samples = vec![0.1f32; 100];
        assert!(matches!(
            compute_linear(&samples, 16000, 10.0, 20.0),
            Err(Error::InsufficientSamples { needed: 320, actual: 100 })
        ));
    }
}
