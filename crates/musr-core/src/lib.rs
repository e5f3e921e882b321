#![deny(missing_docs)]
#![doc = "Core error families, run sources and physical constants shared by the muSR reduction crates."]

pub mod constants;
pub mod errors;
pub mod provenance;
pub mod rng;
pub mod run;

pub use errors::{ErrorInfo, MusrError};
pub use provenance::{ReductionProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use run::{HistogramRun, RunSource, SyntheticRunSpec};
