#![allow(dead_code)]

use musr_asym::{CalibrationParameters, DetectorGroup, ReductionConfig};
use musr_core::{HistogramRun, SyntheticRunSpec};

/// Two detectors, one per group, prompt in bin 0 and a one-bin baseline.
pub fn pair_config() -> ReductionConfig {
    ReductionConfig {
        alpha: 1.0,
        group: DetectorGroup {
            forward: vec![0],
            backward: vec![1],
        },
        calibration: CalibrationParameters {
            nt0: vec![0, 0],
            dt0: vec![0.0, 0.0],
            offset: 0,
            firstbin: 0,
            lastbin: vec![1, 1],
        },
    }
}

/// [`pair_config`] with the prompt moved to bin 1, leaving bin 0 as baseline.
pub fn zero_background_config() -> ReductionConfig {
    let mut config = pair_config();
    config.calibration.nt0 = vec![1, 1];
    config
}

/// Four detectors with realistic prompt bins for synthetic runs.
pub fn synthetic_config() -> ReductionConfig {
    ReductionConfig {
        alpha: 1.0,
        group: DetectorGroup {
            forward: vec![0, 1],
            backward: vec![2, 3],
        },
        calibration: CalibrationParameters {
            nt0: vec![40, 41, 40, 42],
            dt0: vec![0.1, -0.3, 0.0, 0.2],
            offset: 2,
            firstbin: 2,
            lastbin: vec![35, 35, 35, 35],
        },
    }
}

pub fn synthetic_run(run_number: u64, bin_width_ns: f64, histogram_length: usize) -> HistogramRun {
    HistogramRun::synthetic(&SyntheticRunSpec {
        run_number,
        bin_width_ns,
        histogram_length,
        nt0: vec![40, 41, 40, 42],
        forward: vec![0, 1],
        n0: 400.0,
        asymmetry: 0.2,
        background: 3.0,
        seed: run_number,
    })
    .expect("synthetic run")
}

pub fn pair_run(run_number: u64, bin_width_ns: f64, counts: &[u64]) -> HistogramRun {
    HistogramRun::new(run_number, bin_width_ns, vec![counts.to_vec(), counts.to_vec()])
        .expect("run")
}

/// Both detectors get an empty bin 0 followed by `counts`.
pub fn zero_background_run(run_number: u64, bin_width_ns: f64, counts: &[u64]) -> HistogramRun {
    let histogram: Vec<u64> = std::iter::once(0).chain(counts.iter().copied()).collect();
    HistogramRun::new(run_number, bin_width_ns, vec![histogram.clone(), histogram]).expect("run")
}
