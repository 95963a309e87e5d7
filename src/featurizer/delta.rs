//! Delta (time derivative) features.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Regression delta coefficients over the time axis (axis 0).
///
/// For each frame `t` the delta is `sum(n * x[t + n]) / (2 * sum(n^2))` for
/// `n` in `-window..=window`, with the first and last frames repeated at the
/// edges.
pub fn delta(feat: &Array2<f64>, window: usize) -> Result<Array2<f64>> {
    if window < 1 {
        return Err(Error::Config("delta window must be at least 1".into()));
    }
    let num_frames = feat.nrows();
    let mut out = Array2::<f64>::zeros(feat.dim());
    if num_frames == 0 {
        return Ok(out);
    }

    let window = window as isize;
    let denominator = 2.0 * (1..=window).map(|n| (n * n) as f64).sum::<f64>();
    let last = num_frames as isize - 1;

    for t in 0..num_frames as isize {
        let mut row = out.row_mut(t as usize);
        for n in -window..=window {
            if n == 0 {
                continue;
            }
            let source = feat.row((t + n).clamp(0, last) as usize);
            row.scaled_add(n as f64 / denominator, &source);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Array2<f64> {
        Array2::from_shape_fn((frames, 2), |(t, d)| (t * (d + 1)) as f64)
    }

    #[test]
    fn test_linear_ramp_has_unit_slope() {
        let out = delta(&ramp(8), 2).unwrap();
        for t in 2..6 {
            assert!((out[[t, 0]] - 1.0).abs() < 1e-12);
            assert!((out[[t, 1]] - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_edges_are_padded() {
        let out = delta(&ramp(8), 2).unwrap();
        // padded values 0, 0, 0, 1, 2 => (1 + 4) / 10
        assert!((out[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_second_order_of_ramp_is_flat_inside() {
        let first = delta(&ramp(12), 2).unwrap();
        let second = delta(&first, 2).unwrap();
        for t in 4..8 {
            assert!(second[[t, 0]].abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(delta(&ramp(3), 0).is_err());
    }
}
