//! Speed perturbation by resampling the time axis.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{parse_params, AugmentationStep};
use crate::audio::{Waveform, MIN_SPEED_RATE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct SpeedParams {
    #[serde(default = "default_min_speed_rate")]
    min_speed_rate: f64,
    #[serde(default = "default_max_speed_rate")]
    max_speed_rate: f64,
    #[serde(default = "default_num_rates")]
    num_rates: usize,
}

fn default_min_speed_rate() -> f64 {
    0.9
}

fn default_max_speed_rate() -> f64 {
    1.1
}

fn default_num_rates() -> usize {
    3
}

/// Changes playback speed by a random rate.
///
/// With `num_rates > 0` the rate is picked from `num_rates` evenly spaced
/// values between the bounds (inclusive); otherwise it is drawn uniformly.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedPerturbAugmentor {
    min_speed_rate: f64,
    max_speed_rate: f64,
    rates: Vec<f64>,
}

impl SpeedPerturbAugmentor {
    pub fn new(min_speed_rate: f64, max_speed_rate: f64, num_rates: usize) -> Result<Self> {
        if !(min_speed_rate >= MIN_SPEED_RATE
            && min_speed_rate <= max_speed_rate
            && max_speed_rate.is_finite())
        {
            return Err(Error::Config(format!(
                "speed range {min_speed_rate}..{max_speed_rate} must be finite, non-empty and start at {MIN_SPEED_RATE} or above"
            )));
        }
        let rates = match num_rates {
            0 => Vec::new(),
            1 => vec![min_speed_rate],
            n => (0..n)
                .map(|i| {
                    min_speed_rate + (max_speed_rate - min_speed_rate) * i as f64 / (n - 1) as f64
                })
                .collect(),
        };
        Ok(Self {
            min_speed_rate,
            max_speed_rate,
            rates,
        })
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let params: SpeedParams = parse_params("speed", params)?;
        Self::new(params.min_speed_rate, params.max_speed_rate, params.num_rates)
    }

    /// Candidate rates, empty when rates are drawn continuously.
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }
}

impl AugmentationStep for SpeedPerturbAugmentor {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn supports_audio(&self) -> bool {
        true
    }

    fn transform_audio(&self, waveform: &mut Waveform, rng: &mut StdRng) -> Result<()> {
        let speed_rate = if self.rates.is_empty() {
            rng.gen_range(self.min_speed_rate..=self.max_speed_rate)
        } else {
            self.rates[rng.gen_range(0..self.rates.len())]
        };
        waveform.change_speed(speed_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_are_evenly_spaced() {
        let augmentor = SpeedPerturbAugmentor::new(0.9, 1.1, 3).unwrap();
        let rates = augmentor.rates();
        assert_eq!(rates.len(), 3);
        assert!((rates[0] - 0.9).abs() < 1e-12);
        assert!((rates[1] - 1.0).abs() < 1e-12);
        assert!((rates[2] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        assert!(SpeedPerturbAugmentor::new(0.0, 1.1, 3).is_err());
        assert!(SpeedPerturbAugmentor::new(1.2, 1.1, 3).is_err());
    }

    #[test]
    fn test_degenerate_ranges_rejected() {
        assert!(SpeedPerturbAugmentor::new(1e-12, 1.1, 0).is_err());
        assert!(SpeedPerturbAugmentor::new(0.9, f64::INFINITY, 0).is_err());
        assert!(SpeedPerturbAugmentor::new(f64::NAN, 1.1, 0).is_err());
        assert!(SpeedPerturbAugmentor::new(MIN_SPEED_RATE, 1.1, 0).is_ok());
    }
}
