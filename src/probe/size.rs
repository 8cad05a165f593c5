//! Total input size of a sample for one pipeline.
//!
//! Sizes are summed in bytes and converted to gigabytes for threshold
//! comparison. The conversion uses binary gigabytes (2^30 bytes) truncated
//! toward zero at a resolution of 0.001 GB, computed in integer arithmetic so
//! the same byte count always lands on the same side of a threshold.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ResolutionFailure;
use crate::interface::PipelineSpec;

use super::{split_paths, SizeProber};

const BYTES_PER_GB: u128 = 1 << 30;
const MILLI_GB_PER_GB: u128 = 1000;

/// Aggregated input size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSize {
    pub bytes: u64,
    pub gigabytes: f64,
}

impl InputSize {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes,
            gigabytes: bytes_to_gigabytes(bytes),
        }
    }
}

/// Converts a byte count to GB, truncating toward zero at 0.001 GB.
pub fn bytes_to_gigabytes(bytes: u64) -> f64 {
    let milli_gb = u128::from(bytes) * MILLI_GB_PER_GB / BYTES_PER_GB;
    milli_gb as f64 / MILLI_GB_PER_GB as f64
}

/// Sums the sizes of a sample's input files for `spec`.
///
/// Required files must exist; other declared inputs are counted only when
/// present. Each distinct path contributes once.
///
/// # Errors
///
/// - `MissingRequiredInputFile` when a required attribute or file is absent.
/// - `SizeProbeError` when a file's existence cannot be checked or an
///   existing file cannot be measured.
pub fn aggregate_input_size(
    spec: &PipelineSpec,
    attributes: &BTreeMap<String, String>,
    prober: &dyn SizeProber,
) -> Result<InputSize, ResolutionFailure> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut total: u64 = 0;

    for attribute in &spec.required_input_files {
        let value = attributes
            .get(attribute)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ResolutionFailure::MissingRequiredInputFile {
                attribute: attribute.clone(),
                path: None,
            })?;

        for path in split_paths(value) {
            if !seen.insert(path) {
                continue;
            }
            if !check_exists(prober, path)? {
                return Err(ResolutionFailure::MissingRequiredInputFile {
                    attribute: attribute.clone(),
                    path: Some(path.to_string()),
                });
            }
            total = total.saturating_add(measure(prober, path)?);
        }
    }

    for attribute in &spec.all_input_files {
        let Some(value) = attributes.get(attribute) else {
            continue;
        };
        for path in split_paths(value) {
            if !seen.insert(path) {
                continue;
            }
            if !check_exists(prober, path)? {
                trace!(attribute = %attribute, path = %path, "Optional input absent");
                continue;
            }
            total = total.saturating_add(measure(prober, path)?);
        }
    }

    Ok(InputSize::from_bytes(total))
}

fn check_exists(prober: &dyn SizeProber, path: &str) -> Result<bool, ResolutionFailure> {
    prober
        .exists(Path::new(path))
        .map_err(|e| ResolutionFailure::SizeProbeError {
            path: path.to_string(),
            message: e.to_string(),
        })
}

fn measure(prober: &dyn SizeProber, path: &str) -> Result<u64, ResolutionFailure> {
    prober
        .size(Path::new(path))
        .map_err(|e| ResolutionFailure::SizeProbeError {
            path: path.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::path::PathBuf;

    const GB: u64 = 1 << 30;

    #[derive(Default)]
    struct FakeProber {
        sizes: HashMap<PathBuf, u64>,
        broken: Vec<PathBuf>,
        unreachable: Vec<PathBuf>,
    }

    impl FakeProber {
        fn with_file(mut self, path: &str, bytes: u64) -> Self {
            self.sizes.insert(PathBuf::from(path), bytes);
            self
        }

        fn with_broken(mut self, path: &str) -> Self {
            self.broken.push(PathBuf::from(path));
            self
        }

        fn with_unreachable(mut self, path: &str) -> Self {
            self.unreachable.push(PathBuf::from(path));
            self
        }
    }

    impl SizeProber for FakeProber {
        fn exists(&self, path: &Path) -> io::Result<bool> {
            if self.unreachable.iter().any(|p| p == path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "parent denied"));
            }
            Ok(self.sizes.contains_key(path) || self.broken.iter().any(|p| p == path))
        }

        fn size(&self, path: &Path) -> io::Result<u64> {
            if self.broken.iter().any(|p| p == path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.sizes
                .get(path)
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "gone"))
        }
    }

    fn spec() -> PipelineSpec {
        let mut spec = PipelineSpec::new("atac.py", "atac.py");
        spec.required_input_files = vec!["read1".to_string()];
        spec.all_input_files = vec!["read1".to_string(), "read2".to_string()];
        spec
    }

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_gigabyte_conversion_truncates() {
        assert_eq!(bytes_to_gigabytes(0), 0.0);
        assert_eq!(bytes_to_gigabytes(4 * GB), 4.0);
        assert_eq!(bytes_to_gigabytes(4 * GB - 1), 3.999);
        assert_eq!(bytes_to_gigabytes(GB / 2), 0.5);
        // 1.0009 GB still reads as 1.000
        assert_eq!(bytes_to_gigabytes(GB + GB / 1200), 1.0);
    }

    #[test]
    fn test_sums_required_and_present_optional_once() {
        let prober = FakeProber::default()
            .with_file("r1.fq", 3 * GB)
            .with_file("r2.fq", GB);
        let size = aggregate_input_size(
            &spec(),
            &attrs(&[("read1", "r1.fq"), ("read2", "r2.fq")]),
            &prober,
        )
        .expect("size");
        assert_eq!(size.bytes, 4 * GB);
        assert_eq!(size.gigabytes, 4.0);
    }

    #[test]
    fn test_missing_optional_file_excluded() {
        let prober = FakeProber::default().with_file("r1.fq", GB);
        let size = aggregate_input_size(
            &spec(),
            &attrs(&[("read1", "r1.fq"), ("read2", "absent.fq")]),
            &prober,
        )
        .expect("size");
        assert_eq!(size.bytes, GB);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let prober = FakeProber::default();
        let err = aggregate_input_size(&spec(), &attrs(&[("read1", "r1.fq")]), &prober).unwrap_err();
        assert_eq!(
            err,
            ResolutionFailure::MissingRequiredInputFile {
                attribute: "read1".to_string(),
                path: Some("r1.fq".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_required_attribute_fails() {
        let prober = FakeProber::default();
        let err = aggregate_input_size(&spec(), &attrs(&[]), &prober).unwrap_err();
        assert!(matches!(
            err,
            ResolutionFailure::MissingRequiredInputFile { path: None, .. }
        ));
    }

    #[test]
    fn test_size_read_error_is_distinct_from_absence() {
        let prober = FakeProber::default().with_broken("r1.fq");
        let err = aggregate_input_size(&spec(), &attrs(&[("read1", "r1.fq")]), &prober).unwrap_err();
        assert!(matches!(err, ResolutionFailure::SizeProbeError { .. }));
    }

    #[test]
    fn test_existence_check_error_is_not_absence() {
        let prober = FakeProber::default().with_unreachable("locked/r1.fq");
        let err = aggregate_input_size(&spec(), &attrs(&[("read1", "locked/r1.fq")]), &prober)
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionFailure::SizeProbeError {
                path: "locked/r1.fq".to_string(),
                message: "parent denied".to_string(),
            }
        );

        let prober = FakeProber::default()
            .with_file("r1.fq", GB)
            .with_unreachable("locked/r2.fq");
        let err = aggregate_input_size(
            &spec(),
            &attrs(&[("read1", "r1.fq"), ("read2", "locked/r2.fq")]),
            &prober,
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionFailure::SizeProbeError { .. }));
    }

    #[test]
    fn test_multiple_paths_in_one_attribute() {
        let prober = FakeProber::default()
            .with_file("a.fq", GB)
            .with_file("b.fq", 2 * GB);
        let size =
            aggregate_input_size(&spec(), &attrs(&[("read1", "a.fq b.fq")]), &prober).expect("size");
        assert_eq!(size.bytes, 3 * GB);
    }
}
