use std::fmt;
use std::fs;
use std::path::Path;

use musr_core::errors::{ErrorInfo, MusrError};
use musr_core::provenance::{ReductionProvenance, SchemaVersion};
use musr_core::RunSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::asymmetry::{combined_counts, compute_asymmetry, AsymmetrySeries};
use crate::calibration::{build_time_axis, TimeAxis};
use crate::config::ReductionConfig;
use crate::guard::{
    Admission, AlwaysDecline, ConfirmationPolicy, GeometryReference, RunCompatibilityGuard,
};
use crate::hash::stable_hash_string;
use crate::normalize::estimate_rate;
use crate::rebin::ReducedData;
use crate::serde::{from_json_slice, to_pretty_json};

/// Schema written into every [`AccumulatorSnapshot`].
pub const SNAPSHOT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Rows of asymmetry and error in ingestion order, with their run numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccumulatedResult {
    rows: Vec<AsymmetrySeries>,
    run_ids: Vec<u64>,
}

impl AccumulatedResult {
    /// Accumulated rows.
    pub fn rows(&self) -> &[AsymmetrySeries] {
        &self.rows
    }

    /// Run numbers, one per row.
    pub fn run_ids(&self) -> &[u64] {
        &self.run_ids
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no run has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push(&mut self, series: AsymmetrySeries, run_id: u64) {
        self.rows.push(series);
        self.run_ids.push(run_id);
    }
}

/// Lifecycle of an accumulator, derived from the number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorPhase {
    /// Nothing ingested; the next run calibrates.
    Empty,
    /// One run ingested; time axis and geometry fixed.
    Calibrated,
    /// Several runs stacked.
    Accumulating,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Run number of the ingested run.
    pub run_number: u64,
    /// Row index of the run in the accumulated result.
    pub row: usize,
    /// Estimated initial counting rate used for normalization.
    pub rate: f64,
    /// Whether the run calibrated the accumulator.
    pub calibrated: bool,
    /// Whether the run was accepted despite a geometry mismatch.
    pub negotiated: bool,
}

/// Persisted form of an accumulator. The confirmation policy is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    /// Snapshot schema version.
    pub schema_version: SchemaVersion,
    /// Reduction configuration.
    pub config: ReductionConfig,
    /// Established geometry, absent before the first run.
    pub reference: Option<GeometryReference>,
    /// Shared time axis.
    pub time: TimeAxis,
    /// Accumulated rows and run numbers.
    pub result: AccumulatedResult,
}

/// Stacks the asymmetry of successive compatible runs.
///
/// Ingestion is transactional: every check and computation happens on local
/// values and the accumulator is only updated once the whole run succeeded.
pub struct MultiRunAccumulator {
    config: ReductionConfig,
    guard: RunCompatibilityGuard,
    time: TimeAxis,
    result: AccumulatedResult,
    policy: Box<dyn ConfirmationPolicy + Send>,
}

impl fmt::Debug for MultiRunAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiRunAccumulator")
            .field("config", &self.config)
            .field("guard", &self.guard)
            .field("bins", &self.time.len())
            .field("runs", &self.result.run_ids)
            .finish_non_exhaustive()
    }
}

impl MultiRunAccumulator {
    /// Creates an empty accumulator that declines geometry mismatches.
    pub fn new(config: ReductionConfig) -> Result<Self, MusrError> {
        Self::with_policy(config, Box::new(AlwaysDecline))
    }

    /// Creates an empty accumulator with an explicit confirmation policy.
    pub fn with_policy(
        config: ReductionConfig,
        policy: Box<dyn ConfirmationPolicy + Send>,
    ) -> Result<Self, MusrError> {
        config.validate()?;
        Ok(Self {
            config,
            guard: RunCompatibilityGuard::default(),
            time: TimeAxis::default(),
            result: AccumulatedResult::default(),
            policy,
        })
    }

    /// Replaces the confirmation policy.
    pub fn set_policy(&mut self, policy: Box<dyn ConfirmationPolicy + Send>) {
        self.policy = policy;
    }

    /// Reduction configuration.
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Shared time axis; empty before the first run.
    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// Accumulated rows and run numbers.
    pub fn result(&self) -> &AccumulatedResult {
        &self.result
    }

    /// Established geometry, if any.
    pub fn reference(&self) -> Option<&GeometryReference> {
        self.guard.reference()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> AccumulatorPhase {
        match self.result.len() {
            0 => AccumulatorPhase::Empty,
            1 => AccumulatorPhase::Calibrated,
            _ => AccumulatorPhase::Accumulating,
        }
    }

    /// Reduces `run` to an asymmetry row and appends it.
    pub fn ingest(&mut self, run: &dyn RunSource) -> Result<IngestReport, MusrError> {
        let admission = self.guard.admit(run, self.policy.as_mut())?;

        let fresh_axis = match admission {
            Admission::Calibrate(_) => {
                self.check_coverage(run, None)
                    .map_err(|gap| gap.into_error(MusrError::Config, "run-coverage"))?;
                Some(build_time_axis(run, &self.config.calibration, &self.config.group)?)
            }
            Admission::Negotiated(_) => {
                self.check_coverage(run, Some(self.time.len()))
                    .map_err(|gap| gap.into_error(MusrError::Geometry, "geometry-uncovered"))?;
                None
            }
            Admission::Compatible => None,
        };
        let time = fresh_axis.as_ref().unwrap_or(&self.time);

        let calibration = &self.config.calibration;
        let bins = time.len();
        let forward = aggregate(&self.config.group.forward, run, calibration, bins)?;
        let backward = aggregate(&self.config.group.backward, run, calibration, bins)?;
        let combined = combined_counts(&forward, &backward, self.config.alpha);
        let rate = estimate_rate(time.as_slice(), &combined)?;
        let series = compute_asymmetry(
            &forward,
            &backward,
            time.as_slice(),
            self.config.alpha,
            rate,
        );

        let calibrated = fresh_axis.is_some();
        if let (Admission::Calibrate(reference), Some(axis)) = (admission, fresh_axis) {
            info!(
                run = run.run_number(),
                bins = axis.len(),
                bin_width_ns = reference.bin_width_ns,
                "calibrated accumulator"
            );
            self.guard.establish(reference);
            self.time = axis;
        }
        self.result.push(series, run.run_number());
        debug!(run = run.run_number(), rate, rows = self.result.len(), "ingested run");

        Ok(IngestReport {
            run_number: run.run_number(),
            row: self.result.len() - 1,
            rate,
            calibrated,
            negotiated: matches!(admission, Admission::Negotiated(_)),
        })
    }

    /// Appends a precomputed row to a calibrated accumulator.
    pub fn append(&mut self, series: AsymmetrySeries, run_id: u64) -> Result<(), MusrError> {
        if self.time.is_empty() {
            return Err(MusrError::data(
                "uncalibrated",
                "rows can only be appended after the first run calibrated the time axis",
            ));
        }
        if series.asymmetry.len() != self.time.len() || series.error.len() != self.time.len() {
            return Err(MusrError::Data(
                ErrorInfo::new("row-length", "row does not match the time axis")
                    .with_context("bins", self.time.len())
                    .with_context("asymmetry", series.asymmetry.len())
                    .with_context("error", series.error.len()),
            ));
        }
        self.result.push(series, run_id);
        Ok(())
    }

    /// Forgets every run, the time axis and the reference geometry.
    pub fn reset(&mut self) {
        info!(runs = self.result.len(), "reset accumulator");
        self.guard.clear();
        self.time = TimeAxis::default();
        self.result = AccumulatedResult::default();
    }

    /// Time axis together with a copy of every row.
    pub fn reduced(&self) -> ReducedData {
        ReducedData {
            time: self.time.as_slice().to_vec(),
            rows: self.result.rows.clone(),
            run_ids: self.result.run_ids.clone(),
        }
    }

    /// Hashes of configuration and accumulated result, for reproducibility checks.
    pub fn provenance(&self) -> Result<ReductionProvenance, MusrError> {
        Ok(ReductionProvenance {
            config_hash: stable_hash_string(&self.config)?,
            result_hash: stable_hash_string(&(&self.time, &self.result))?,
            runs: self.result.run_ids.clone(),
            tool_versions: [(
                env!("CARGO_PKG_NAME").to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            )]
            .into_iter()
            .collect(),
        })
    }

    /// Persisted form of the accumulator.
    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            schema_version: SNAPSHOT_SCHEMA,
            config: self.config.clone(),
            reference: self.guard.reference().copied(),
            time: self.time.clone(),
            result: self.result.clone(),
        }
    }

    /// Restores an accumulator that continues ingesting without re-calibration.
    pub fn from_snapshot(
        snapshot: AccumulatorSnapshot,
        policy: Box<dyn ConfirmationPolicy + Send>,
    ) -> Result<Self, MusrError> {
        if !SNAPSHOT_SCHEMA.is_compatible_with(&snapshot.schema_version) {
            return Err(MusrError::Serde(
                ErrorInfo::new("snapshot-schema", "unsupported snapshot schema")
                    .with_context("major", snapshot.schema_version.major)
                    .with_context("supported_major", SNAPSHOT_SCHEMA.major),
            ));
        }
        snapshot.config.validate()?;
        let bins = snapshot.time.len();
        let consistent = match snapshot.reference {
            None => bins == 0 && snapshot.result.is_empty(),
            Some(reference) => {
                snapshot.config.calibration.usable_bins(reference.histogram_length) == Some(bins)
                    && snapshot.time.is_strictly_increasing()
                    && !snapshot.result.is_empty()
                    && snapshot.result.rows.len() == snapshot.result.run_ids.len()
                    && snapshot
                        .result
                        .rows
                        .iter()
                        .all(|row| row.asymmetry.len() == bins && row.error.len() == bins)
            }
        };
        if !consistent {
            return Err(MusrError::Serde(
                ErrorInfo::new(
                    "snapshot-inconsistent",
                    "snapshot time axis or rows do not match its geometry",
                )
                    .with_context("bins", bins)
                    .with_context("rows", snapshot.result.rows.len())
                    .with_context("run_ids", snapshot.result.run_ids.len()),
            ));
        }
        Ok(Self {
            config: snapshot.config,
            guard: RunCompatibilityGuard::with_reference(snapshot.reference),
            time: snapshot.time,
            result: snapshot.result,
            policy,
        })
    }

    /// Writes the snapshot to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<(), MusrError> {
        let json = to_pretty_json(&self.snapshot())?;
        fs::write(path, json).map_err(|err| {
            MusrError::Serde(
                ErrorInfo::new("snapshot-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }

    /// Reads a snapshot written by [`MultiRunAccumulator::save`].
    pub fn load(
        path: &Path,
        policy: Box<dyn ConfirmationPolicy + Send>,
    ) -> Result<Self, MusrError> {
        let bytes = fs::read(path).map_err(|err| {
            MusrError::Serde(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_snapshot(from_json_slice(&bytes)?, policy)
    }

    /// Checks that `run` holds every grouped histogram, its baseline window and
    /// the aggregation slice of `bins` bins (or of the bins the run itself
    /// would calibrate when `bins` is `None`).
    fn check_coverage(
        &self,
        run: &dyn RunSource,
        bins: Option<usize>,
    ) -> Result<(), CoverageGap> {
        let calibration = &self.config.calibration;
        let length = run.histogram_length();
        let bins = bins.or_else(|| calibration.usable_bins(length)).unwrap_or(0);
        for detector in self.config.group.members() {
            if detector >= run.number_of_histograms() {
                return Err(CoverageGap {
                    detector,
                    reason: "detector missing from run",
                    required: detector + 1,
                    available: run.number_of_histograms(),
                });
            }
            let lastbin = calibration.lastbin[detector];
            if lastbin > length {
                return Err(CoverageGap {
                    detector,
                    reason: "baseline window beyond histogram",
                    required: lastbin,
                    available: length,
                });
            }
            if bins == 0 {
                continue;
            }
            let end = calibration
                .slice_start(detector)
                .and_then(|start| start.checked_add(bins));
            match end {
                Some(end) if end <= length => {}
                _ => {
                    return Err(CoverageGap {
                        detector,
                        reason: "histogram ends before the time axis",
                        required: end.unwrap_or(usize::MAX),
                        available: length,
                    })
                }
            }
        }
        Ok(())
    }
}

struct CoverageGap {
    detector: usize,
    reason: &'static str,
    required: usize,
    available: usize,
}

impl CoverageGap {
    fn into_error(self, family: fn(ErrorInfo) -> MusrError, code: &str) -> MusrError {
        family(
            ErrorInfo::new(code, self.reason)
                .with_context("detector", self.detector)
                .with_context("required", self.required)
                .with_context("available", self.available),
        )
    }
}
