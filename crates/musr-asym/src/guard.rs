use std::fmt;

use musr_core::errors::{ErrorInfo, MusrError};
use musr_core::RunSource;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Binning and histogram geometry fixed by the first accepted run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryReference {
    /// Bin width in nanoseconds.
    pub bin_width_ns: f64,
    /// Number of histograms.
    pub number_of_histograms: usize,
    /// Bins per histogram.
    pub histogram_length: usize,
}

impl GeometryReference {
    /// Geometry of `run`.
    pub fn of(run: &dyn RunSource) -> Self {
        Self {
            bin_width_ns: run.bin_width_ns(),
            number_of_histograms: run.number_of_histograms(),
            histogram_length: run.histogram_length(),
        }
    }
}

/// Histogram count or length differing from the reference at equal bin width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryMismatch {
    /// Run number of the offending run.
    pub run_number: u64,
    /// Established geometry.
    pub reference: GeometryReference,
    /// Geometry of the offending run.
    pub found: GeometryReference,
}

impl fmt::Display for GeometryMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} has {} histograms of {} bins, accumulated runs have {} histograms of {} bins",
            self.run_number,
            self.found.number_of_histograms,
            self.found.histogram_length,
            self.reference.number_of_histograms,
            self.reference.histogram_length
        )
    }
}

/// Synchronous decision whether to ingest a run with mismatched geometry.
///
/// Returning `false` declines the run; implementations that can be cancelled
/// should decline rather than block.
pub trait ConfirmationPolicy {
    /// Returns `true` to ingest the run despite the mismatch.
    fn confirm(&mut self, mismatch: &GeometryMismatch) -> bool;
}

/// Accepts every geometry mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl ConfirmationPolicy for AlwaysConfirm {
    fn confirm(&mut self, _mismatch: &GeometryMismatch) -> bool {
        true
    }
}

/// Declines every geometry mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDecline;

impl ConfirmationPolicy for AlwaysDecline {
    fn confirm(&mut self, _mismatch: &GeometryMismatch) -> bool {
        false
    }
}

impl<F> ConfirmationPolicy for F
where
    F: FnMut(&GeometryMismatch) -> bool,
{
    fn confirm(&mut self, mismatch: &GeometryMismatch) -> bool {
        self(mismatch)
    }
}

/// Persistent state of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// No run has been accepted.
    Empty,
    /// Geometry fixed by the first run.
    Calibrated,
}

/// Why a run may proceed to aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// First run; its geometry becomes the reference once ingestion succeeds.
    Calibrate(GeometryReference),
    /// Geometry matches the reference in every dimension.
    Compatible,
    /// Geometry differs but the confirmation policy accepted it.
    Negotiated(GeometryMismatch),
}

/// Compatibility state machine over the runs of one accumulator.
///
/// `Empty` moves to `Calibrated` once the first run is committed. A differing
/// bin width is rejected outright; differing histogram count or length is put
/// to the [`ConfirmationPolicy`]. A rejection concerns the offending ingestion
/// only, the guard keeps its state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCompatibilityGuard {
    reference: Option<GeometryReference>,
}

impl RunCompatibilityGuard {
    /// Guard restored from a persisted reference.
    pub fn with_reference(reference: Option<GeometryReference>) -> Self {
        Self { reference }
    }

    /// Current state.
    pub fn state(&self) -> GuardState {
        match self.reference {
            Some(_) => GuardState::Calibrated,
            None => GuardState::Empty,
        }
    }

    /// Established geometry, if any.
    pub fn reference(&self) -> Option<&GeometryReference> {
        self.reference.as_ref()
    }

    /// Decides whether `run` may be ingested. Never mutates the guard.
    pub fn admit(
        &self,
        run: &dyn RunSource,
        policy: &mut dyn ConfirmationPolicy,
    ) -> Result<Admission, MusrError> {
        let found = GeometryReference::of(run);
        let Some(reference) = self.reference else {
            return Ok(Admission::Calibrate(found));
        };
        if found.bin_width_ns != reference.bin_width_ns {
            warn!(
                run = run.run_number(),
                reference_ns = reference.bin_width_ns,
                found_ns = found.bin_width_ns,
                "rejected run with different resolution"
            );
            return Err(MusrError::Resolution(
                ErrorInfo::new(
                    "resolution-mismatch",
                    "runs with different bin widths cannot be accumulated",
                )
                .with_context("run", run.run_number())
                .with_context("reference_bin_width_ns", reference.bin_width_ns)
                .with_context("bin_width_ns", found.bin_width_ns)
                .with_hint("start a new accumulator or reset this one"),
            ));
        }
        if found.number_of_histograms == reference.number_of_histograms
            && found.histogram_length == reference.histogram_length
        {
            return Ok(Admission::Compatible);
        }
        let mismatch = GeometryMismatch {
            run_number: run.run_number(),
            reference,
            found,
        };
        if policy.confirm(&mismatch) {
            info!(%mismatch, "geometry mismatch accepted");
            Ok(Admission::Negotiated(mismatch))
        } else {
            warn!(%mismatch, "geometry mismatch declined");
            Err(MusrError::Geometry(
                ErrorInfo::new("geometry-declined", mismatch.to_string())
                    .with_context("run", mismatch.run_number)
                    .with_context(
                        "reference_histograms",
                        reference.number_of_histograms,
                    )
                    .with_context("histograms", found.number_of_histograms)
                    .with_context("reference_length", reference.histogram_length)
                    .with_context("length", found.histogram_length)
                    .with_hint("reset the accumulator to change histogram geometry"),
            ))
        }
    }

    pub(crate) fn establish(&mut self, reference: GeometryReference) {
        self.reference = Some(reference);
    }

    pub(crate) fn clear(&mut self) {
        self.reference = None;
    }
}
