use musr_core::constants::NS_PER_US;
use musr_core::errors::{ErrorInfo, MusrError};
use musr_core::RunSource;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorGroup;

fn calibration_error(code: &str, message: impl Into<String>) -> MusrError {
    MusrError::Config(ErrorInfo::new(code, message.into()))
}

/// Per-detector zero-time calibration and baseline windows.
///
/// The prompt peak of detector `d` sits in bin `nt0[d]`, shifted by the
/// fractional offset `dt0[d]`:
///
/// * prompt entirely in bin `n`: `nt0 = n`, `dt0 = 0`;
/// * prompt split evenly between `n` and `n + 1`: `nt0 = n`, `dt0 = 0.5`;
/// * prompt 0.45 in `n` and 0.55 in `n + 1`: `nt0 = n + 1`, `dt0 = -0.45`.
///
/// `offset` skips a further number of bins after the prompt on every detector.
/// The background of detector `d` is the mean of bins `firstbin..lastbin[d]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Prompt bin index per detector.
    pub nt0: Vec<usize>,
    /// Fractional sub-bin prompt offset per detector.
    pub dt0: Vec<f64>,
    /// Bins skipped after the prompt on every detector.
    #[serde(default)]
    pub offset: usize,
    /// First bin of the baseline window, shared by all detectors.
    pub firstbin: usize,
    /// Exclusive end of the baseline window per detector.
    pub lastbin: Vec<usize>,
}

impl CalibrationParameters {
    /// Number of detectors described by the calibration.
    pub fn detectors(&self) -> usize {
        self.nt0.len()
    }

    /// Largest prompt bin over all detectors.
    pub fn max_nt0(&self) -> usize {
        self.nt0.iter().copied().max().unwrap_or(0)
    }

    /// First bin of the aggregation slice of `detector`; `None` for an
    /// unknown detector or when `nt0 + offset` overflows.
    pub fn slice_start(&self, detector: usize) -> Option<usize> {
        self.nt0.get(detector)?.checked_add(self.offset)
    }

    /// Number of usable bins for histograms of `histogram_length` bins.
    pub fn usable_bins(&self, histogram_length: usize) -> Option<usize> {
        histogram_length
            .checked_sub(self.max_nt0())?
            .checked_sub(self.offset)
            .filter(|&bins| bins > 0)
    }

    /// Checks per-detector array shapes, sub-bin offsets and baseline windows.
    pub fn validate(&self) -> Result<(), MusrError> {
        let detectors = self.detectors();
        if detectors == 0 {
            return Err(calibration_error(
                "empty-calibration",
                "calibration must describe at least one detector",
            ));
        }
        for (name, len) in [("dt0", self.dt0.len()), ("lastbin", self.lastbin.len())] {
            if len != detectors {
                return Err(MusrError::Config(
                    ErrorInfo::new("calibration-shape", "per-detector arrays differ in length")
                        .with_context("field", name)
                        .with_context("expected", detectors)
                        .with_context("found", len),
                ));
            }
        }
        if let Some((detector, dt0)) = self
            .dt0
            .iter()
            .enumerate()
            .find(|(_, dt0)| !dt0.is_finite())
        {
            return Err(MusrError::Config(
                ErrorInfo::new("dt0-not-finite", "fractional prompt offset must be finite")
                    .with_context("detector", detector)
                    .with_context("dt0", dt0),
            ));
        }
        if let Some((detector, lastbin)) = self
            .lastbin
            .iter()
            .enumerate()
            .find(|(_, &lastbin)| lastbin <= self.firstbin)
        {
            return Err(MusrError::Config(
                ErrorInfo::new("baseline-window", "firstbin must be smaller than lastbin")
                    .with_context("detector", detector)
                    .with_context("firstbin", self.firstbin)
                    .with_context("lastbin", lastbin),
            ));
        }
        Ok(())
    }
}

/// Shared time axis of the accumulated asymmetry, in microseconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeAxis(Vec<f64>);

impl TimeAxis {
    /// Number of time bins.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the axis has not been established.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bin centres in microseconds.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Whether every value exceeds its predecessor.
    pub fn is_strictly_increasing(&self) -> bool {
        self.0.windows(2).all(|pair| pair[1] > pair[0])
    }
}

/// Builds the time axis from the first run of an accumulation.
///
/// `time[i] = (i + offset + mean(dt0 over forward ∪ backward)) * bin_width_ns / 1000`
/// for the `histogram_length - max(nt0) - offset` usable bins.
pub fn build_time_axis(
    run: &dyn RunSource,
    calibration: &CalibrationParameters,
    group: &DetectorGroup,
) -> Result<TimeAxis, MusrError> {
    let histogram_length = run.histogram_length();
    let usable = calibration.usable_bins(histogram_length).ok_or_else(|| {
        MusrError::Config(
            ErrorInfo::new("no-usable-bins", "prompt bins and offset leave no usable bins")
                .with_context("histogram_length", histogram_length)
                .with_context("max_nt0", calibration.max_nt0())
                .with_context("offset", calibration.offset),
        )
    })?;

    let members: Vec<usize> = group.members().collect();
    let mut dt0_sum = 0.0;
    for &detector in &members {
        dt0_sum += calibration.dt0.get(detector).copied().ok_or_else(|| {
            MusrError::Config(
                ErrorInfo::new("detector-index", "grouped detector has no calibration")
                    .with_context("detector", detector),
            )
        })?;
    }
    let mean_dt0 = dt0_sum / members.len().max(1) as f64;

    let scale = run.bin_width_ns() / NS_PER_US;
    let shift = calibration.offset as f64 + mean_dt0;
    let time: Vec<f64> = (0..usable)
        .map(|bin| (bin as f64 + shift) * scale)
        .collect();
    debug!(
        bins = usable,
        mean_dt0,
        bin_width_ns = run.bin_width_ns(),
        "built time axis"
    );
    Ok(TimeAxis(time))
}
