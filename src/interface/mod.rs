//! Pipeline interface loading.
//!
//! A pipeline interface declares, per pipeline, how to build its command line
//! from sample attributes and which compute resources to request for a given
//! input size.
//!
//! # Example
//!
//! ```ignore
//! use piface::interface::PipelineInterface;
//!
//! let iface = PipelineInterface::load_file("pipelines/pipeline_interface.yaml")?;
//! for spec in iface.iter() {
//!     println!("{} -> {}", spec.key, spec.path);
//! }
//! ```

pub mod schema;

pub use schema::{infer_name, ArgumentSpec, PipelineSpec};

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info};

use crate::error::InterfaceError;
use crate::resources::ResourcePackage;

/// The parsed, validated set of pipelines from one interface definition.
///
/// Immutable once built; share it behind an `Arc` across workers.
#[derive(Debug, Clone)]
pub struct PipelineInterface {
    pipelines: Vec<PipelineSpec>,
    source: Option<PathBuf>,
    base_dir: PathBuf,
}

impl PipelineInterface {
    /// Loads and validates an interface from a YAML file.
    ///
    /// Relative pipeline paths will later resolve against the file's directory.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, InterfaceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let value: Value =
            serde_yaml::from_str(&content).map_err(|e| InterfaceError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut iface = Self::from_value(&value, base_dir)?;
        iface.source = Some(path.to_path_buf());
        info!(
            file = %path.display(),
            pipelines = iface.len(),
            "Loaded pipeline interface"
        );
        Ok(iface)
    }

    /// Parses an interface from YAML text.
    pub fn from_yaml_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, InterfaceError> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| InterfaceError::ParseError {
                path: "<string>".to_string(),
                message: e.to_string(),
            })?;
        Self::from_value(&value, base_dir)
    }

    /// Builds an interface from an already-parsed YAML tree.
    ///
    /// Accepts `{pipelines: {...}}` or a flat mapping of pipeline keys.
    pub fn from_value(value: &Value, base_dir: impl Into<PathBuf>) -> Result<Self, InterfaceError> {
        let root = match value {
            Value::Mapping(root) => root,
            Value::Null => {
                return Err(InterfaceError::NotAMapping {
                    found: "an empty document".to_string(),
                })
            }
            _ => {
                return Err(InterfaceError::NotAMapping {
                    found: "a non-mapping document".to_string(),
                })
            }
        };

        let pipelines = match root.get("pipelines") {
            Some(Value::Mapping(pipelines)) => pipelines,
            Some(_) => {
                return Err(InterfaceError::NotAMapping {
                    found: "a non-mapping 'pipelines' section".to_string(),
                })
            }
            None => root,
        };

        let mut specs = Vec::with_capacity(pipelines.len());
        for (key, body) in pipelines {
            let key = key.as_str().ok_or_else(|| InterfaceError::InvalidPipelineKey {
                found: format!("{:?}", key),
            })?;
            let spec = PipelineSpec::from_value(key, body)?;
            debug!(
                pipeline = %spec.key,
                name = %spec.name,
                arguments = spec.arguments.len(),
                optional = spec.optional_arguments.len(),
                local_only = spec.is_local_only(),
                "Parsed pipeline"
            );
            specs.push(spec);
        }

        Ok(Self {
            pipelines: specs,
            source: None,
            base_dir: base_dir.into(),
        })
    }

    /// Builds an interface directly from specs (mostly for tests).
    pub fn from_specs(pipelines: Vec<PipelineSpec>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipelines,
            source: None,
            base_dir: base_dir.into(),
        }
    }

    /// Looks up a pipeline by key.
    pub fn get(&self, key: &str) -> Result<&PipelineSpec, InterfaceError> {
        self.pipelines
            .iter()
            .find(|spec| spec.key == key)
            .ok_or_else(|| InterfaceError::UnknownPipeline(key.to_string()))
    }

    /// Display name of a pipeline.
    pub fn pipeline_name(&self, key: &str) -> Result<&str, InterfaceError> {
        self.get(key).map(|spec| spec.name.as_str())
    }

    /// Whether the pipeline expects the injected config/cores/memory flags.
    pub fn uses_looper_args(&self, key: &str) -> Result<bool, InterfaceError> {
        self.get(key).map(|spec| spec.looper_args)
    }

    /// Selects the resource package for a pipeline and input size.
    ///
    /// Local-only pipelines yield `None` for every valid size. Negative or
    /// NaN sizes fail with `InvalidSizeRequest` either way.
    pub fn choose_resource_package(
        &self,
        key: &str,
        size_gb: f64,
    ) -> Result<Option<&ResourcePackage>, InterfaceError> {
        let spec = self.get(key)?;
        let invalid = || InterfaceError::InvalidSizeRequest {
            pipeline: key.to_string(),
            size: size_gb,
        };
        match &spec.resources {
            Some(policy) => policy.select(size_gb).map(Some).map_err(|_| invalid()),
            None if size_gb.is_nan() || size_gb < 0.0 => Err(invalid()),
            None => Ok(None),
        }
    }

    /// Pipeline keys in declaration order.
    pub fn pipeline_keys(&self) -> impl Iterator<Item = &str> {
        self.pipelines.iter().map(|spec| spec.key.as_str())
    }

    /// Pipelines in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PipelineSpec> {
        self.pipelines.iter()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Directory that relative pipeline paths resolve against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The file this interface was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
