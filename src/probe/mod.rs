//! Filesystem and file-format capabilities the resolver depends on.
//!
//! - [`SizeProber`]: existence and size checks for input files.
//! - [`NgsDetector`]: read length / read type detection from sequencing files.
//!
//! Both are traits so batch runs can be tested without real data on disk.
//! Calls are blocking; the batch orchestrator runs them on the blocking pool.

pub mod size;

pub use size::{aggregate_input_size, bytes_to_gigabytes, InputSize};

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Attribute name filled by NGS detection.
pub const READ_LENGTH_ATTRIBUTE: &str = "read_length";
/// Attribute name filled by NGS detection.
pub const READ_TYPE_ATTRIBUTE: &str = "read_type";

/// Reports whether input files exist and how large they are.
pub trait SizeProber: Send + Sync {
    /// Whether `path` exists. An error means existence could not be checked.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Size of `path` in bytes.
    fn size(&self, path: &Path) -> io::Result<u64>;
}

/// Probes the local filesystem via file metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProber;

impl SizeProber for FsProber {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        std::fs::metadata(path).map(|meta| meta.len())
    }
}

/// Errors from NGS attribute detection. Always non-fatal for resolution.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Derived sequencing attributes; unset fields were not detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NgsAttributes {
    pub read_length: Option<String>,
    pub read_type: Option<String>,
}

impl NgsAttributes {
    /// Writes detected values into `attributes` without overriding existing ones.
    pub fn fill_missing(&self, attributes: &mut BTreeMap<String, String>) {
        let detected = [
            (READ_LENGTH_ATTRIBUTE, &self.read_length),
            (READ_TYPE_ATTRIBUTE, &self.read_type),
        ];
        for (name, value) in detected {
            if let Some(value) = value {
                attributes
                    .entry(name.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

/// Detects read length and read type from sequencing input files.
pub trait NgsDetector: Send + Sync {
    fn detect(&self, paths: &[PathBuf]) -> Result<NgsAttributes, DetectError>;
}

/// Detector that never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl NgsDetector for NullDetector {
    fn detect(&self, _paths: &[PathBuf]) -> Result<NgsAttributes, DetectError> {
        Ok(NgsAttributes::default())
    }
}

/// Splits an attribute value into the file paths it names.
///
/// Values may list several paths separated by whitespace.
pub fn split_paths(value: &str) -> impl Iterator<Item = &str> {
    value.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fs_prober() {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(&[0u8; 2048]).expect("failed to write");

        let prober = FsProber;
        assert!(prober.exists(file.path()).expect("checkable"));
        assert_eq!(prober.size(file.path()).unwrap(), 2048);

        let missing = file.path().with_extension("missing");
        assert!(!prober.exists(&missing).expect("checkable"));
        assert!(prober.size(&missing).is_err());
    }

    #[test]
    fn test_fill_missing_keeps_sample_values() {
        let mut attributes = BTreeMap::new();
        attributes.insert("read_type".to_string(), "SINGLE".to_string());

        let detected = NgsAttributes {
            read_length: Some("50".to_string()),
            read_type: Some("PAIRED".to_string()),
        };
        detected.fill_missing(&mut attributes);

        assert_eq!(attributes["read_type"], "SINGLE");
        assert_eq!(attributes["read_length"], "50");
    }

    #[test]
    fn test_split_paths() {
        let paths: Vec<&str> = split_paths(" a.fq  b.fq\tc.fq ").collect();
        assert_eq!(paths, vec!["a.fq", "b.fq", "c.fq"]);
        assert_eq!(split_paths("   ").count(), 0);
    }
}
