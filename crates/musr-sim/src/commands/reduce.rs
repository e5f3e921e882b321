use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use musr_asym::serde::from_json_slice;
use musr_asym::{
    AlwaysConfirm, AlwaysDecline, ConfirmationPolicy, FitWindow, MultiRunAccumulator,
    ReducedData, ReductionConfig,
};
use musr_core::provenance::ReductionProvenance;
use musr_core::{ErrorInfo, HistogramRun, MusrError};
use serde::Serialize;
use tracing::{info, warn};

use crate::console::ConsolePolicy;
use crate::write_json;

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// YAML or JSON reduction configuration.
    #[arg(long, required_unless_present = "resume")]
    pub config: Option<PathBuf>,
    /// Run files (JSON histograms), ingested in the given order.
    #[arg(long = "run", value_name = "PATH", required = true)]
    pub runs: Vec<PathBuf>,
    /// Output file for the reduced asymmetry.
    #[arg(long)]
    pub out: PathBuf,
    /// Continue from a saved accumulator instead of starting empty.
    #[arg(long)]
    pub resume: Option<PathBuf>,
    /// Save the accumulator after ingestion.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Accept histogram geometry mismatches without asking.
    #[arg(long, conflicts_with = "assume_no")]
    pub assume_yes: bool,
    /// Decline histogram geometry mismatches without asking.
    #[arg(long)]
    pub assume_no: bool,
    /// First time bin written to the output.
    #[arg(long, default_value_t = 0)]
    pub window_start: usize,
    /// One past the last time bin written to the output.
    #[arg(long)]
    pub window_end: Option<usize>,
    /// Average this many consecutive bins in the output.
    #[arg(long, default_value_t = 1)]
    pub rebin: usize,
}

#[derive(Debug, Serialize)]
struct RejectedRun {
    path: String,
    error: MusrError,
}

#[derive(Debug, Serialize)]
struct ReduceReport {
    provenance: ReductionProvenance,
    rejected: Vec<RejectedRun>,
    data: ReducedData,
}

fn policy(args: &ReduceArgs) -> Box<dyn ConfirmationPolicy + Send> {
    if args.assume_yes {
        Box::new(AlwaysConfirm)
    } else if args.assume_no {
        Box::new(AlwaysDecline)
    } else {
        Box::new(ConsolePolicy::stdin())
    }
}

fn load_run(path: &Path) -> Result<HistogramRun, MusrError> {
    let bytes = fs::read(path).map_err(|err| {
        MusrError::Serde(
            ErrorInfo::new("run-read", err.to_string()).with_context("path", path.display()),
        )
    })?;
    let run: HistogramRun = from_json_slice(&bytes)?;
    run.validate()?;
    Ok(run)
}

pub fn run(args: &ReduceArgs) -> Result<(), Box<dyn Error>> {
    let mut accumulator = match &args.resume {
        Some(path) => {
            let acc = MultiRunAccumulator::load(path, Box::new(AlwaysDecline))?;
            info!(path = %path.display(), runs = acc.result().len(), "resumed accumulator");
            acc
        }
        None => {
            let config_path = args
                .config
                .as_deref()
                .ok_or("a configuration is required unless resuming")?;
            MultiRunAccumulator::new(ReductionConfig::load(config_path)?)?
        }
    };
    accumulator.set_policy(policy(args));

    let mut rejected = Vec::new();
    for path in &args.runs {
        let outcome = load_run(path).and_then(|run| accumulator.ingest(&run));
        match outcome {
            Ok(report) => info!(
                run = report.run_number,
                row = report.row,
                rate = report.rate,
                negotiated = report.negotiated,
                "accumulated run"
            ),
            Err(error) => {
                warn!(path = %path.display(), %error, "run not accumulated");
                rejected.push(RejectedRun {
                    path: path.display().to_string(),
                    error,
                });
            }
        }
    }

    if let Some(path) = &args.snapshot {
        accumulator.save(path)?;
    }
    if accumulator.result().is_empty() {
        return Err("no run could be accumulated".into());
    }

    let window = FitWindow {
        start: args.window_start,
        end: args.window_end.unwrap_or(usize::MAX),
    };
    let data = accumulator.reduced().window(window)?.rebin(args.rebin)?;
    let report = ReduceReport {
        provenance: accumulator.provenance()?,
        rejected,
        data,
    };
    write_json(&args.out, &report)?;
    info!(out = %args.out.display(), rows = report.data.rows.len(), "wrote reduced asymmetry");
    Ok(())
}
