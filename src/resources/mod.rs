//! Compute resource packages and best-fit selection.
//!
//! A pipeline's resource policy is a step function keyed on the total input
//! size of a sample. Each [`ResourcePackage`] becomes active once the sample
//! reaches its `file_size` threshold (in GB), and the package with the largest
//! threshold not exceeding the sample size wins.
//!
//! Packages are sorted once when the policy is built, so selection is a
//! binary search over the cached order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the package every resource policy must declare.
pub const DEFAULT_PACKAGE_NAME: &str = "default";

/// Errors raised by resource selection.
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    /// The requested size is negative or not a number.
    #[error("Input size must be a non-negative number, got {0}")]
    InvalidSize(f64),
}

/// A named bundle of compute resources with its activation threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePackage {
    /// Package name, the mapping key in the interface file.
    pub name: String,
    /// Minimum total input size in GB that activates this package.
    pub file_size: f64,
    /// Remaining key/value pairs (`cores`, `mem`, `time`, ...) in declaration order.
    pub values: Vec<(String, String)>,
}

impl ResourcePackage {
    /// Creates a package with no resource values.
    pub fn new(name: impl Into<String>, file_size: f64) -> Self {
        Self {
            name: name.into(),
            file_size,
            values: Vec::new(),
        }
    }

    /// Adds a resource value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    /// Looks up a resource value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether this is the mandatory fallback package.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_PACKAGE_NAME
    }
}

/// The resource packages of one pipeline, sorted ascending by threshold.
///
/// Construction does not validate; the interface loader guarantees a
/// `default` package at 0 and unique thresholds before building one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    packages: Vec<ResourcePackage>,
}

impl ResourcePolicy {
    /// Builds a policy, sorting packages by threshold.
    pub fn new(mut packages: Vec<ResourcePackage>) -> Self {
        packages.sort_by(|a, b| a.file_size.total_cmp(&b.file_size));
        Self { packages }
    }

    /// Packages in ascending threshold order.
    pub fn packages(&self) -> &[ResourcePackage] {
        &self.packages
    }

    /// Looks up a package by name.
    pub fn get(&self, name: &str) -> Option<&ResourcePackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Selects the best-fit package for a total input size in GB.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::InvalidSize` for negative or NaN sizes.
    pub fn select(&self, size_gb: f64) -> Result<&ResourcePackage, ResourceError> {
        if size_gb.is_nan() || size_gb < 0.0 {
            return Err(ResourceError::InvalidSize(size_gb));
        }
        // A policy always holds `default` at 0, so a valid size always matches.
        select_package(&self.packages, size_gb).ok_or(ResourceError::InvalidSize(size_gb))
    }
}

/// Picks the package with the largest threshold not exceeding `size_gb`.
///
/// `sorted` must be ascending by `file_size`. Returns `None` only when no
/// package qualifies.
pub fn select_package(sorted: &[ResourcePackage], size_gb: f64) -> Option<&ResourcePackage> {
    let qualifying = sorted.partition_point(|p| p.file_size <= size_gb);
    qualifying.checked_sub(1).map(|idx| &sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ResourcePolicy {
        ResourcePolicy::new(vec![
            ResourcePackage::new("huge", 30.0).with_value("cores", "24"),
            ResourcePackage::new("default", 0.0).with_value("cores", "1"),
            ResourcePackage::new("midsize", 10.0).with_value("cores", "8"),
        ])
    }

    #[test]
    fn test_packages_sorted_on_construction() {
        let policy = policy();
        let names: Vec<&str> = policy.packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["default", "midsize", "huge"]);
    }

    #[test]
    fn test_selects_proper_package() {
        let policy = policy();
        for (size, expected) in [(0.0, "default"), (4.0, "default"), (16.0, "midsize"), (64.0, "huge")] {
            assert_eq!(policy.select(size).unwrap().name, expected, "size {}", size);
        }
    }

    #[test]
    fn test_boundary_selects_exact_threshold() {
        let policy = ResourcePolicy::new(vec![
            ResourcePackage::new("default", 0.0),
            ResourcePackage::new("high", 4.0),
        ]);
        assert_eq!(policy.select(3.9).unwrap().name, "default");
        assert_eq!(policy.select(4.0).unwrap().name, "high");
        assert_eq!(policy.select(10.0).unwrap().name, "high");
    }

    #[test]
    fn test_negative_and_nan_sizes_rejected() {
        let policy = policy();
        assert_eq!(policy.select(-0.5), Err(ResourceError::InvalidSize(-0.5)));
        assert!(policy.select(f64::NAN).is_err());
    }

    #[test]
    fn test_selection_is_largest_qualifying_threshold() {
        let policy = ResourcePolicy::new(vec![
            ResourcePackage::new("default", 0.0),
            ResourcePackage::new("a", 0.5),
            ResourcePackage::new("b", 2.25),
            ResourcePackage::new("c", 7.0),
            ResourcePackage::new("d", 100.0),
        ]);
        let mut size = 0.0;
        while size < 150.0 {
            let chosen = policy.select(size).unwrap();
            assert!(chosen.file_size <= size);
            assert!(policy
                .packages()
                .iter()
                .filter(|p| p.file_size <= size)
                .all(|p| p.file_size <= chosen.file_size));
            size += 0.125;
        }
    }

    #[test]
    fn test_select_package_empty() {
        assert!(select_package(&[], 3.0).is_none());
    }

    #[test]
    fn test_package_value_lookup() {
        let package = ResourcePackage::new("default", 0.0)
            .with_value("cores", "6")
            .with_value("mem", "6000");
        assert_eq!(package.get("mem"), Some("6000"));
        assert_eq!(package.get("time"), None);
        assert!(package.is_default());
    }
}
