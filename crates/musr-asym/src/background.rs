use musr_core::errors::{ErrorInfo, MusrError};

use crate::calibration::CalibrationParameters;

/// Mean counts of `histogram[firstbin..lastbin[detector]]`.
pub fn estimate_background(
    calibration: &CalibrationParameters,
    detector: usize,
    histogram: &[u64],
) -> Result<f64, MusrError> {
    let window = baseline_window(calibration, detector, histogram.len())?;
    let counts = &histogram[window.0..window.1];
    let total: f64 = counts.iter().map(|&count| count as f64).sum();
    Ok(total / counts.len() as f64)
}

/// Baseline window of `detector`, checked against a histogram of `histogram_length` bins.
pub fn baseline_window(
    calibration: &CalibrationParameters,
    detector: usize,
    histogram_length: usize,
) -> Result<(usize, usize), MusrError> {
    let lastbin = calibration.lastbin.get(detector).copied().ok_or_else(|| {
        MusrError::Config(
            ErrorInfo::new("detector-index", "detector has no baseline window")
                .with_context("detector", detector),
        )
    })?;
    if calibration.firstbin >= lastbin || lastbin > histogram_length {
        return Err(MusrError::Config(
            ErrorInfo::new("baseline-window", "baseline window outside the histogram")
                .with_context("detector", detector)
                .with_context("firstbin", calibration.firstbin)
                .with_context("lastbin", lastbin)
                .with_context("histogram_length", histogram_length),
        ));
    }
    Ok((calibration.firstbin, lastbin))
}
