//! Run data sources consumed by the reduction engine.

use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::constants::{NS_PER_US, TAU_MU_US};
use crate::errors::{ErrorInfo, MusrError};
use crate::rng::RngHandle;

/// Read-only view of a single measurement run.
///
/// Implementations must keep every histogram at [`RunSource::histogram_length`]
/// bins and return `None` for detector indices outside
/// `0..number_of_histograms()`.
pub trait RunSource {
    /// Time width of a single bin in nanoseconds.
    fn bin_width_ns(&self) -> f64;

    /// Number of detector histograms in the run.
    fn number_of_histograms(&self) -> usize;

    /// Number of bins in each histogram.
    fn histogram_length(&self) -> usize;

    /// Counts recorded by `detector`.
    fn histogram(&self, detector: usize) -> Option<&[u64]>;

    /// Facility run number.
    fn run_number(&self) -> u64;
}

/// In-memory run with one positron-count histogram per detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramRun {
    run_number: u64,
    bin_width_ns: f64,
    histograms: Vec<Vec<u64>>,
}

impl HistogramRun {
    /// Builds a run after checking the bin width and histogram shapes.
    pub fn new(
        run_number: u64,
        bin_width_ns: f64,
        histograms: Vec<Vec<u64>>,
    ) -> Result<Self, MusrError> {
        let run = Self {
            run_number,
            bin_width_ns,
            histograms,
        };
        run.validate()?;
        Ok(run)
    }

    /// Checks the invariants that deserialized runs cannot enforce by construction.
    pub fn validate(&self) -> Result<(), MusrError> {
        if !(self.bin_width_ns.is_finite() && self.bin_width_ns > 0.0) {
            return Err(MusrError::Data(
                ErrorInfo::new("bin-width", "bin width must be positive and finite")
                    .with_context("run", self.run_number)
                    .with_context("bin_width_ns", self.bin_width_ns),
            ));
        }
        let Some(first) = self.histograms.first() else {
            return Err(MusrError::Data(
                ErrorInfo::new("no-histograms", "run carries no histograms")
                    .with_context("run", self.run_number),
            ));
        };
        let length = first.len();
        if let Some((detector, histo)) = self
            .histograms
            .iter()
            .enumerate()
            .find(|(_, histo)| histo.len() != length)
        {
            return Err(MusrError::Data(
                ErrorInfo::new("ragged-histograms", "histograms differ in length")
                    .with_context("run", self.run_number)
                    .with_context("detector", detector)
                    .with_context("expected", length)
                    .with_context("found", histo.len()),
            ));
        }
        Ok(())
    }

    /// Synthesises a Poisson-distributed decay run.
    pub fn synthetic(spec: &SyntheticRunSpec) -> Result<Self, MusrError> {
        let mut histograms = Vec::with_capacity(spec.nt0.len());
        for (detector, &nt0) in spec.nt0.iter().enumerate() {
            let sign = if spec.forward.contains(&detector) {
                1.0
            } else {
                -1.0
            };
            let mut rng = RngHandle::substream(spec.seed, detector as u64);
            let mut histo = Vec::with_capacity(spec.histogram_length);
            for bin in 0..spec.histogram_length {
                let mut rate = spec.background;
                if bin >= nt0 {
                    let t = (bin - nt0) as f64 * spec.bin_width_ns / NS_PER_US;
                    rate += spec.n0 * (-t / TAU_MU_US).exp() * (1.0 + sign * spec.asymmetry);
                }
                histo.push(sample_counts(rate, &mut rng)?);
            }
            histograms.push(histo);
        }
        Self::new(spec.run_number, spec.bin_width_ns, histograms)
    }

    /// All histograms, indexed by detector.
    pub fn histograms(&self) -> &[Vec<u64>] {
        &self.histograms
    }
}

fn sample_counts(rate: f64, rng: &mut RngHandle) -> Result<u64, MusrError> {
    if rate <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(rate).map_err(|err| {
        MusrError::Data(ErrorInfo::new("synthetic-rate", err.to_string()).with_context("rate", rate))
    })?;
    Ok(poisson.sample(rng) as u64)
}

impl RunSource for HistogramRun {
    fn bin_width_ns(&self) -> f64 {
        self.bin_width_ns
    }

    fn number_of_histograms(&self) -> usize {
        self.histograms.len()
    }

    fn histogram_length(&self) -> usize {
        self.histograms.first().map_or(0, Vec::len)
    }

    fn histogram(&self, detector: usize) -> Option<&[u64]> {
        self.histograms.get(detector).map(Vec::as_slice)
    }

    fn run_number(&self) -> u64 {
        self.run_number
    }
}

/// Parameters of a synthetic decay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRunSpec {
    /// Run number stamped on the result.
    pub run_number: u64,
    /// Bin width in nanoseconds.
    pub bin_width_ns: f64,
    /// Bins per histogram.
    pub histogram_length: usize,
    /// Prompt bin per detector; its length sets the number of histograms.
    pub nt0: Vec<usize>,
    /// Detectors that see `1 + asymmetry`; all others see `1 - asymmetry`.
    pub forward: Vec<usize>,
    /// Mean counts in the prompt bin.
    pub n0: f64,
    /// Signed decay asymmetry.
    pub asymmetry: f64,
    /// Flat background counts per bin.
    pub background: f64,
    /// Master seed.
    pub seed: u64,
}

impl Default for SyntheticRunSpec {
    fn default() -> Self {
        Self {
            run_number: 1,
            bin_width_ns: 0.9765625,
            histogram_length: 2048,
            nt0: vec![40, 40],
            forward: vec![0],
            n0: 500.0,
            asymmetry: 0.2,
            background: 2.0,
            seed: 0,
        }
    }
}
