//! Structured error types shared across the reduction crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MusrError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (detector indices, bin widths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the reduction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MusrError {
    /// Invalid alpha, grouping, calibration or baseline window.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// Bin width of a run differs from the calibrated reference.
    #[error("resolution mismatch: {0}")]
    Resolution(ErrorInfo),
    /// Histogram count or length differs and the mismatch was not accepted.
    #[error("geometry mismatch: {0}")]
    Geometry(ErrorInfo),
    /// The decay-rate normalization could not be estimated.
    #[error("normalization error: {0}")]
    Normalization(ErrorInfo),
    /// Malformed run data.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Serialization, schema and I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MusrError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MusrError::Config(info)
            | MusrError::Resolution(info)
            | MusrError::Geometry(info)
            | MusrError::Normalization(info)
            | MusrError::Data(info)
            | MusrError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        MusrError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a data error.
    pub fn data(code: &str, message: impl Into<String>) -> Self {
        MusrError::Data(ErrorInfo::new(code, message))
    }

    /// Shorthand for a serde error built from any displayable cause.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        MusrError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Whether the error is a bin-width mismatch.
    pub fn is_resolution_mismatch(&self) -> bool {
        matches!(self, MusrError::Resolution(_))
    }

    /// Whether the error is a histogram geometry mismatch.
    pub fn is_geometry_mismatch(&self) -> bool {
        matches!(self, MusrError::Geometry(_))
    }

    /// Whether the error stems from invalid configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, MusrError::Config(_))
    }
}
