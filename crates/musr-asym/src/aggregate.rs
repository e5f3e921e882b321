use musr_core::errors::{ErrorInfo, MusrError};
use musr_core::RunSource;
use serde::{Deserialize, Serialize};

use crate::background::estimate_background;
use crate::calibration::CalibrationParameters;

/// Group sums aligned with the time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSums {
    /// Background-subtracted counts.
    pub corrected: Vec<f64>,
    /// Raw counts, kept for Poisson variances.
    pub raw: Vec<f64>,
}

impl GroupSums {
    fn zeros(len: usize) -> Self {
        Self {
            corrected: vec![0.0; len],
            raw: vec![0.0; len],
        }
    }
}

/// Sums the slices `[nt0[d] + offset, nt0[d] + offset + bins)` of every detector in `detectors`.
pub fn aggregate(
    detectors: &[usize],
    run: &dyn RunSource,
    calibration: &CalibrationParameters,
    bins: usize,
) -> Result<GroupSums, MusrError> {
    let mut sums = GroupSums::zeros(bins);
    for &detector in detectors {
        let histogram = run.histogram(detector).ok_or_else(|| {
            MusrError::Data(
                ErrorInfo::new("missing-histogram", "run has no histogram for detector")
                    .with_context("run", run.run_number())
                    .with_context("detector", detector),
            )
        })?;
        let slice = calibration
            .slice_start(detector)
            .and_then(|start| Some(start..start.checked_add(bins)?))
            .and_then(|range| histogram.get(range))
            .ok_or_else(|| {
                MusrError::Data(
                    ErrorInfo::new("short-histogram", "histogram ends before the time axis")
                        .with_context("run", run.run_number())
                        .with_context("detector", detector)
                        .with_context("bins", bins)
                        .with_context("available", histogram.len()),
                )
            })?;
        let background = estimate_background(calibration, detector, histogram)?;
        for ((corrected, raw), &count) in sums
            .corrected
            .iter_mut()
            .zip(sums.raw.iter_mut())
            .zip(slice)
        {
            *corrected += count as f64 - background;
            *raw += count as f64;
        }
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use musr_core::HistogramRun;

    fn calibration() -> CalibrationParameters {
        CalibrationParameters {
            nt0: vec![1, 2],
            dt0: vec![0.0, 0.0],
            offset: 1,
            firstbin: 0,
            lastbin: vec![1, 1],
        }
    }

    #[test]
    fn sums_aligned_slices() {
        let run = HistogramRun::new(
            5,
            1.0,
            vec![vec![2, 9, 20, 30, 40, 50], vec![4, 9, 9, 100, 200, 300]],
        )
        .unwrap();
        let sums = aggregate(&[0, 1], &run, &calibration(), 3).unwrap();
        assert_eq!(sums.raw, vec![120.0, 230.0, 340.0]);
        assert_eq!(sums.corrected, vec![114.0, 224.0, 334.0]);
    }

    #[test]
    fn short_histogram_is_reported() {
        let run = HistogramRun::new(5, 1.0, vec![vec![1; 4], vec![1; 4]]).unwrap();
        let err = aggregate(&[1], &run, &calibration(), 3).unwrap_err();
        assert_eq!(err.info().code, "short-histogram");
    }

    #[test]
    fn overflowing_prompt_bin_is_reported() {
        let run = HistogramRun::new(5, 1.0, vec![vec![1; 4], vec![1; 4]]).unwrap();
        let mut cal = calibration();
        cal.nt0[1] = usize::MAX;
        let err = aggregate(&[1], &run, &cal, 3).unwrap_err();
        assert_eq!(err.info().code, "short-histogram");
    }
}
