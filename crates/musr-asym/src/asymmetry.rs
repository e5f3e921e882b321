use musr_core::constants::TAU_MU_US;
use serde::{Deserialize, Serialize};

use crate::aggregate::GroupSums;

/// Asymmetry of one run with its statistical error, aligned with the time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymmetrySeries {
    /// Decay-corrected asymmetry.
    pub asymmetry: Vec<f64>,
    /// Poisson error of each point; never zero.
    pub error: Vec<f64>,
}

impl AsymmetrySeries {
    /// Number of time bins.
    pub fn len(&self) -> usize {
        self.asymmetry.len()
    }

    /// Whether the series holds no bins.
    pub fn is_empty(&self) -> bool {
        self.asymmetry.is_empty()
    }
}

/// `F + alpha * B` of the background-corrected group sums.
pub fn combined_counts(forward: &GroupSums, backward: &GroupSums, alpha: f64) -> Vec<f64> {
    forward
        .corrected
        .iter()
        .zip(&backward.corrected)
        .map(|(f, b)| f + alpha * b)
        .collect()
}

/// Decay-corrected asymmetry and Poisson error of one run.
///
/// `asymmetry = (F - alpha * B) / rate * exp(t / τµ)` on background-corrected
/// counts and `error = sqrt(Fraw + alpha² * Braw) * exp(t / τµ) / rate` on raw
/// counts. Zero errors are replaced by one. All inputs must share the length
/// of `time`.
pub fn compute_asymmetry(
    forward: &GroupSums,
    backward: &GroupSums,
    time: &[f64],
    alpha: f64,
    rate: f64,
) -> AsymmetrySeries {
    let mut asymmetry = Vec::with_capacity(time.len());
    let mut error = Vec::with_capacity(time.len());
    for (i, t) in time.iter().enumerate() {
        let growth = (t / TAU_MU_US).exp();
        let difference = forward.corrected[i] - alpha * backward.corrected[i];
        asymmetry.push(difference / rate * growth);
        let variance = forward.raw[i] + alpha * alpha * backward.raw[i];
        let sigma = variance.sqrt() * growth / rate;
        error.push(if sigma == 0.0 { 1.0 } else { sigma });
    }
    AsymmetrySeries { asymmetry, error }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums(corrected: &[f64], raw: &[f64]) -> GroupSums {
        GroupSums {
            corrected: corrected.to_vec(),
            raw: raw.to_vec(),
        }
    }

    #[test]
    fn asymmetry_at_time_zero() {
        let forward = sums(&[120.0], &[121.0]);
        let backward = sums(&[80.0], &[81.0]);
        let series = compute_asymmetry(&forward, &backward, &[0.0], 1.0, 200.0);
        assert!((series.asymmetry[0] - 0.2).abs() < 1e-12);
        assert!((series.error[0] - (202.0_f64).sqrt() / 200.0).abs() < 1e-12);
    }

    #[test]
    fn zero_error_becomes_one() {
        let empty = sums(&[0.0, 0.0], &[0.0, 0.0]);
        let series = compute_asymmetry(&empty, &empty, &[0.0, 0.1], 1.3, 10.0);
        assert_eq!(series.error, vec![1.0, 1.0]);
        assert_eq!(series.asymmetry, vec![0.0, 0.0]);
    }

    #[test]
    fn alpha_weights_backward_group() {
        let forward = sums(&[100.0], &[100.0]);
        let backward = sums(&[50.0], &[50.0]);
        let series = compute_asymmetry(&forward, &backward, &[0.0], 2.0, 200.0);
        assert_eq!(series.asymmetry[0], 0.0);
        assert!((series.error[0] - (300.0_f64).sqrt() / 200.0).abs() < 1e-12);
        assert_eq!(combined_counts(&forward, &backward, 2.0), vec![200.0]);
    }
}
