use musr_core::errors::{ErrorInfo, MusrError};
use serde::{Deserialize, Serialize};

use crate::asymmetry::AsymmetrySeries;

/// Half-open bin interval `[start, end)` of the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitWindow {
    /// First bin kept.
    pub start: usize,
    /// One past the last bin kept; clamped to the axis length.
    pub end: usize,
}

/// Time axis and accumulated rows handed to fitting or plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedData {
    /// Time in microseconds.
    pub time: Vec<f64>,
    /// One row per run.
    pub rows: Vec<AsymmetrySeries>,
    /// Run numbers, one per row.
    pub run_ids: Vec<u64>,
}

impl ReducedData {
    /// Restricts the time axis and every row to `window`.
    pub fn window(&self, window: FitWindow) -> Result<Self, MusrError> {
        let end = window.end.min(self.time.len());
        if window.start >= end {
            return Err(MusrError::Config(
                ErrorInfo::new("empty-window", "fit window selects no bins")
                    .with_context("start", window.start)
                    .with_context("end", window.end)
                    .with_context("bins", self.time.len()),
            ));
        }
        let range = window.start..end;
        Ok(Self {
            time: self.time[range.clone()].to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| AsymmetrySeries {
                    asymmetry: row.asymmetry[range.clone()].to_vec(),
                    error: row.error[range.clone()].to_vec(),
                })
                .collect(),
            run_ids: self.run_ids.clone(),
        })
    }

    /// Averages groups of `factor` consecutive bins, dropping a trailing partial group.
    ///
    /// Errors add in quadrature: `sqrt(Σ e²) / factor`.
    pub fn rebin(&self, factor: usize) -> Result<Self, MusrError> {
        if factor == 0 {
            return Err(MusrError::config("rebin-factor", "rebin factor must be at least one"));
        }
        if factor == 1 {
            return Ok(self.clone());
        }
        let groups = self.time.len() / factor;
        let k = factor as f64;
        let mean = |values: &[f64]| -> Vec<f64> {
            values
                .chunks_exact(factor)
                .map(|chunk| chunk.iter().sum::<f64>() / k)
                .collect()
        };
        let quadrature = |values: &[f64]| -> Vec<f64> {
            values
                .chunks_exact(factor)
                .map(|chunk| chunk.iter().map(|e| e * e).sum::<f64>().sqrt() / k)
                .collect()
        };
        let kept = groups * factor;
        Ok(Self {
            time: mean(&self.time[..kept]),
            rows: self
                .rows
                .iter()
                .map(|row| AsymmetrySeries {
                    asymmetry: mean(&row.asymmetry[..kept]),
                    error: quadrature(&row.error[..kept]),
                })
                .collect(),
            run_ids: self.run_ids.clone(),
        })
    }
}
