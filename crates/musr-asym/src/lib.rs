#![deny(missing_docs)]
#![doc = "Asymmetry reduction of muSR detector histograms: time-axis calibration, background subtraction, decay normalization and compatibility-checked accumulation across runs."]

/// Multi-run accumulation and persistence.
pub mod accumulator;
/// Forward and backward group aggregation.
pub mod aggregate;
/// Asymmetry and Poisson error computation.
pub mod asymmetry;
/// Baseline background estimation.
pub mod background;
/// Calibration parameters and time-axis construction.
pub mod calibration;
/// Reduction configuration and setup-time validation.
pub mod config;
/// Run compatibility state machine and confirmation policies.
pub mod guard;
/// Canonical hashing helpers.
pub mod hash;
/// Decay-rate normalization estimate.
pub mod normalize;
/// Rebinning and fit-window selection of reduced data.
pub mod rebin;
/// Canonical JSON and YAML serde helpers.
pub mod serde;

pub use accumulator::{
    AccumulatedResult, AccumulatorPhase, AccumulatorSnapshot, IngestReport, MultiRunAccumulator,
};
pub use aggregate::{aggregate, GroupSums};
pub use asymmetry::{compute_asymmetry, AsymmetrySeries};
pub use calibration::{build_time_axis, CalibrationParameters, TimeAxis};
pub use config::{DetectorGroup, ReductionConfig};
pub use guard::{
    Admission, AlwaysConfirm, AlwaysDecline, ConfirmationPolicy, GeometryMismatch,
    GeometryReference, GuardState, RunCompatibilityGuard,
};
pub use normalize::estimate_rate;
pub use rebin::{FitWindow, ReducedData};
