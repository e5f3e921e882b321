use std::error::Error;

use clap::Args;
use musr_asym::{CalibrationParameters, DetectorGroup, MultiRunAccumulator, ReductionConfig};
use musr_core::{HistogramRun, SyntheticRunSpec};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Master seed for the synthetic histograms.
    #[arg(long, default_value_t = 2024)]
    pub seed: u64,
    /// Number of synthetic runs.
    #[arg(long, default_value_t = 3)]
    pub runs: u64,
    /// Asymmetry injected into the synthetic runs.
    #[arg(long, default_value_t = 0.2)]
    pub asymmetry: f64,
    /// Bins averaged when estimating the early-time asymmetry.
    #[arg(long, default_value_t = 100)]
    pub early_bins: usize,
}

#[derive(Debug, Serialize)]
struct DemoRun {
    run: u64,
    rate: f64,
    early_asymmetry: f64,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    seed: u64,
    bins: usize,
    runs: Vec<DemoRun>,
    result_hash: String,
}

fn demo_config() -> ReductionConfig {
    ReductionConfig {
        alpha: 1.0,
        group: DetectorGroup {
            forward: vec![0, 1],
            backward: vec![2, 3],
        },
        calibration: CalibrationParameters {
            nt0: vec![40; 4],
            dt0: vec![0.0; 4],
            offset: 0,
            firstbin: 5,
            lastbin: vec![35; 4],
        },
    }
}

pub fn run(args: &DemoArgs) -> Result<(), Box<dyn Error>> {
    let mut acc = MultiRunAccumulator::new(demo_config())?;
    let mut runs = Vec::new();
    for index in 0..args.runs {
        let spec = SyntheticRunSpec {
            run_number: index + 1,
            nt0: vec![40; 4],
            forward: vec![0, 1],
            asymmetry: args.asymmetry,
            seed: musr_core::derive_substream_seed(args.seed, index),
            ..SyntheticRunSpec::default()
        };
        let report = acc.ingest(&HistogramRun::synthetic(&spec)?)?;
        let row = &acc.result().rows()[report.row];
        let early = &row.asymmetry[..args.early_bins.clamp(1, row.len())];
        runs.push(DemoRun {
            run: report.run_number,
            rate: report.rate,
            early_asymmetry: early.iter().sum::<f64>() / early.len() as f64,
        });
    }
    let report = DemoReport {
        seed: args.seed,
        bins: acc.time().len(),
        runs,
        result_hash: acc.provenance()?.result_hash,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
