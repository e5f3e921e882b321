use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use musr_core::errors::{ErrorInfo, MusrError};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParameters;
use crate::serde::{from_json_slice, from_yaml_slice};

fn default_alpha() -> f64 {
    1.0
}

/// Forward and backward detector sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorGroup {
    /// Detectors facing the initial muon spin.
    pub forward: Vec<usize>,
    /// Detectors on the opposite side.
    pub backward: Vec<usize>,
}

impl DetectorGroup {
    /// Forward detectors followed by backward detectors.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.forward.iter().chain(self.backward.iter()).copied()
    }

    fn validate(&self, detectors: usize) -> Result<(), MusrError> {
        for (name, set) in [("forward", &self.forward), ("backward", &self.backward)] {
            if set.is_empty() {
                return Err(MusrError::Config(
                    ErrorInfo::new("empty-group", "detector group must not be empty")
                        .with_context("group", name),
                ));
            }
        }
        let mut seen = BTreeSet::new();
        for detector in self.members() {
            if detector >= detectors {
                return Err(MusrError::Config(
                    ErrorInfo::new("detector-index", "grouped detector is not calibrated")
                        .with_context("detector", detector)
                        .with_context("calibrated_detectors", detectors),
                ));
            }
            if !seen.insert(detector) {
                return Err(MusrError::Config(
                    ErrorInfo::new("overlapping-groups", "detector listed more than once")
                        .with_context("detector", detector),
                ));
            }
        }
        Ok(())
    }
}

/// Everything the accumulator needs before the first run is ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Forward/backward efficiency balance.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Detector grouping.
    pub group: DetectorGroup,
    /// Zero-time calibration and baseline windows.
    pub calibration: CalibrationParameters,
}

impl ReductionConfig {
    /// Runs every setup-time check.
    pub fn validate(&self) -> Result<(), MusrError> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(MusrError::Config(
                ErrorInfo::new("alpha", "alpha must be positive and finite")
                    .with_context("alpha", self.alpha),
            ));
        }
        self.calibration.validate()?;
        self.group.validate(self.calibration.detectors())
    }

    /// Loads and validates a configuration file, YAML unless the extension is `.json`.
    pub fn load(path: &Path) -> Result<Self, MusrError> {
        let bytes = fs::read(path).map_err(|err| {
            MusrError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => from_json_slice(&bytes)?,
            _ => from_yaml_slice(&bytes)?,
        };
        config.validate()?;
        Ok(config)
    }
}
