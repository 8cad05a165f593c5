//! Error types for pipeline interface operations.
//!
//! Two families live here:
//! - [`InterfaceError`]: load-time problems with an interface definition.
//!   These are fatal for a run since the interface is unusable.
//! - [`ResolutionFailure`]: per (sample, pipeline) problems. The pair is
//!   skipped and the failure is recorded; the batch continues.
//!
//! Both map onto a shared [`FailureKind`] so reports can group them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification shared by load-time and per-pair failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedInterface,
    MissingRequiredAttribute,
    MissingRequiredInputFile,
    InvalidResourceSpec,
    SizeProbeError,
    ResolutionTimeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::MalformedInterface => "MalformedInterface",
            FailureKind::MissingRequiredAttribute => "MissingRequiredAttribute",
            FailureKind::MissingRequiredInputFile => "MissingRequiredInputFile",
            FailureKind::InvalidResourceSpec => "InvalidResourceSpec",
            FailureKind::SizeProbeError => "SizeProbeError",
            FailureKind::ResolutionTimeout => "ResolutionTimeout",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur while loading a pipeline interface definition.
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("IO error reading pipeline interface: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pipeline interface '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Pipeline interface must be a mapping of pipelines, got {found}")]
    NotAMapping { found: String },

    #[error("Pipeline keys must be strings, got {found}")]
    InvalidPipelineKey { found: String },

    #[error("Pipeline '{pipeline}' does not declare a 'path'")]
    MissingPath { pipeline: String },

    #[error("Pipeline '{pipeline}' has unknown field '{field}'")]
    UnknownField { pipeline: String, field: String },

    #[error("Pipeline '{pipeline}': field '{field}' must be {expected}")]
    InvalidShape {
        pipeline: String,
        field: String,
        expected: String,
    },

    #[error("Pipeline '{pipeline}' declares flag '{flag}' more than once")]
    DuplicateFlag { pipeline: String, flag: String },

    #[error("Pipeline '{pipeline}' declares resources without a 'default' package")]
    MissingDefaultPackage { pipeline: String },

    #[error("Pipeline '{pipeline}': 'default' package must have file_size 0, got {file_size}")]
    NonZeroDefaultThreshold { pipeline: String, file_size: f64 },

    #[error("Pipeline '{pipeline}': resource package '{package}' does not declare file_size")]
    MissingFileSize { pipeline: String, package: String },

    #[error("Pipeline '{pipeline}': resource package '{package}' has invalid file_size '{value}'")]
    InvalidFileSize {
        pipeline: String,
        package: String,
        value: String,
    },

    #[error("Pipeline '{pipeline}': resource package '{package}' declares both file_size and min_file_size")]
    ConflictingFileSize { pipeline: String, package: String },

    #[error(
        "Invalid resource specification for pipeline '{pipeline}': packages '{first}' and '{second}' share file_size {file_size}"
    )]
    DuplicateThreshold {
        pipeline: String,
        first: String,
        second: String,
        file_size: f64,
    },

    #[error("Pipeline '{0}' is not configured in this interface")]
    UnknownPipeline(String),

    /// A resource package was requested for a negative or NaN input size.
    #[error("Pipeline '{pipeline}': cannot select resources for input size {size} GB")]
    InvalidSizeRequest { pipeline: String, size: f64 },
}

impl InterfaceError {
    /// Classifies the error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            InterfaceError::DuplicateThreshold { .. }
            | InterfaceError::InvalidSizeRequest { .. } => FailureKind::InvalidResourceSpec,
            _ => FailureKind::MalformedInterface,
        }
    }
}

/// Why a single (sample, pipeline) pair could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResolutionFailure {
    #[error("Sample lacks attribute '{attribute}' required by flag '{flag}'")]
    MissingRequiredAttribute { flag: String, attribute: String },

    #[error("Required input file missing for attribute '{attribute}'{}", path_suffix(.path))]
    MissingRequiredInputFile {
        attribute: String,
        path: Option<String>,
    },

    #[error("Invalid resource specification (package {}): '{key}' {reason}", package_label(.package))]
    InvalidResourceSpec {
        package: Option<String>,
        key: String,
        reason: String,
    },

    #[error("Failed to probe size of '{path}': {message}")]
    SizeProbeError { path: String, message: String },

    #[error("Resolution timed out after {timeout_ms} ms")]
    ResolutionTimeout { timeout_ms: u64 },
}

impl ResolutionFailure {
    /// Classifies the failure for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            ResolutionFailure::MissingRequiredAttribute { .. } => {
                FailureKind::MissingRequiredAttribute
            }
            ResolutionFailure::MissingRequiredInputFile { .. } => {
                FailureKind::MissingRequiredInputFile
            }
            ResolutionFailure::InvalidResourceSpec { .. } => FailureKind::InvalidResourceSpec,
            ResolutionFailure::SizeProbeError { .. } => FailureKind::SizeProbeError,
            ResolutionFailure::ResolutionTimeout { .. } => FailureKind::ResolutionTimeout,
        }
    }

    /// The key an operator has to fix: attribute, resource key or path.
    pub fn offending_key(&self) -> String {
        match self {
            ResolutionFailure::MissingRequiredAttribute { attribute, .. } => attribute.clone(),
            ResolutionFailure::MissingRequiredInputFile { attribute, .. } => attribute.clone(),
            ResolutionFailure::InvalidResourceSpec { key, .. } => key.clone(),
            ResolutionFailure::SizeProbeError { path, .. } => path.clone(),
            ResolutionFailure::ResolutionTimeout { .. } => String::new(),
        }
    }
}

fn path_suffix(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" ({})", path),
        None => " (attribute not set)".to_string(),
    }
}

fn package_label(package: &Option<String>) -> String {
    match package {
        Some(name) => format!("'{}'", name),
        None => "<none>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_error_kinds() {
        let err = InterfaceError::MissingPath {
            pipeline: "wgbs.py".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::MalformedInterface);
        assert!(err.to_string().contains("wgbs.py"));

        let err = InterfaceError::DuplicateThreshold {
            pipeline: "atac".to_string(),
            first: "mid".to_string(),
            second: "big".to_string(),
            file_size: 4.0,
        };
        assert_eq!(err.kind(), FailureKind::InvalidResourceSpec);
    }

    #[test]
    fn test_resolution_failure_display_and_key() {
        let failure = ResolutionFailure::MissingRequiredAttribute {
            flag: "--genome".to_string(),
            attribute: "genome".to_string(),
        };
        assert_eq!(failure.kind(), FailureKind::MissingRequiredAttribute);
        assert_eq!(failure.offending_key(), "genome");
        assert!(failure.to_string().contains("--genome"));

        let failure = ResolutionFailure::MissingRequiredInputFile {
            attribute: "read1".to_string(),
            path: None,
        };
        assert!(failure.to_string().contains("attribute not set"));

        let failure = ResolutionFailure::InvalidResourceSpec {
            package: None,
            key: "cores".to_string(),
            reason: "is required for looper args".to_string(),
        };
        assert!(failure.to_string().contains("<none>"));
    }

    #[test]
    fn test_resolution_failure_serializes_with_kind_tag() {
        let failure = ResolutionFailure::SizeProbeError {
            path: "/data/r1.fq".to_string(),
            message: "permission denied".to_string(),
        };
        let json = serde_json::to_value(&failure).expect("serialize");
        assert_eq!(json["kind"], "SizeProbeError");
        assert_eq!(json["path"], "/data/r1.fq");
    }
}
