use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use musr_asym::{AccumulatorPhase, AlwaysDecline, GeometryReference, MultiRunAccumulator};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot written by `musr-sim reduce --snapshot`.
    #[arg(long)]
    pub snapshot: PathBuf,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    phase: AccumulatorPhase,
    reference: Option<GeometryReference>,
    bins: usize,
    time_range_us: Option<(f64, f64)>,
    runs: Vec<u64>,
    result_hash: String,
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let acc = MultiRunAccumulator::load(&args.snapshot, Box::new(AlwaysDecline))?;
    let time = acc.time().as_slice();
    let report = InspectReport {
        phase: acc.phase(),
        reference: acc.reference().copied(),
        bins: time.len(),
        time_range_us: time.first().zip(time.last()).map(|(a, b)| (*a, *b)),
        runs: acc.result().run_ids().to_vec(),
        result_hash: acc.provenance()?.result_hash,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
