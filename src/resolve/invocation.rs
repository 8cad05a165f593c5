//! Assembles the final invocation for one (sample, pipeline) pair.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionFailure;
use crate::interface::PipelineSpec;
use crate::probe::InputSize;
use crate::resources::ResourcePackage;
use crate::sample::Sample;

use super::arguments::ArgPair;
use super::env::{expand, EnvSnapshot};

/// Flag carrying the project config file for looper-aware pipelines.
pub const CONFIG_FLAG: &str = "-C";
/// Flag carrying the core count for looper-aware pipelines.
pub const CORES_FLAG: &str = "-P";
/// Flag carrying the memory limit for looper-aware pipelines.
pub const MEMORY_FLAG: &str = "-M";

/// Everything the submission layer needs to run one pipeline on one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub pipeline_key: String,
    pub pipeline_name: String,
    pub sample_name: String,
    /// Expanded, absolute-or-interface-relative pipeline path.
    pub pipeline_path: PathBuf,
    pub argv: Vec<ArgPair>,
    /// `None` for local-only pipelines.
    pub resource_package: Option<String>,
    /// Selected package values in declaration order.
    pub resources: Vec<(String, String)>,
    pub input_size: InputSize,
}

impl Invocation {
    /// Renders the pipeline path followed by its arguments.
    pub fn command_line(&self) -> String {
        let mut line = self.pipeline_path.display().to_string();
        for arg in &self.argv {
            line.push(' ');
            line.push_str(&arg.to_string());
        }
        line
    }

    pub fn resource(&self, key: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Builds invocations for pipelines from one interface.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    base_dir: PathBuf,
    env: EnvSnapshot,
    project_config: Option<PathBuf>,
}

impl InvocationBuilder {
    /// `base_dir` is the interface file's directory; `env` feeds path expansion.
    pub fn new(base_dir: impl Into<PathBuf>, env: EnvSnapshot) -> Self {
        Self {
            base_dir: base_dir.into(),
            env,
            project_config: None,
        }
    }

    /// Sets the project config file passed to looper-aware pipelines.
    pub fn with_project_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config = Some(path.into());
        self
    }

    /// Expands and anchors a pipeline path.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(expand(raw, &self.env));
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        }
    }

    /// Composes the invocation from already-resolved parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResourceSpec` when the pipeline uses looper args but
    /// no package was selected or the package lacks `cores` or `mem`.
    pub fn build(
        &self,
        spec: &PipelineSpec,
        sample: &Sample,
        args: Vec<ArgPair>,
        size: InputSize,
        package: Option<&ResourcePackage>,
    ) -> Result<Invocation, ResolutionFailure> {
        let argv = if spec.looper_args {
            let mut argv = self.looper_flags(package)?;
            argv.extend(args);
            argv
        } else {
            args
        };

        Ok(Invocation {
            pipeline_key: spec.key.clone(),
            pipeline_name: spec.name.clone(),
            sample_name: sample.name().to_string(),
            pipeline_path: self.resolve_path(&spec.path),
            argv,
            resource_package: package.map(|p| p.name.clone()),
            resources: package.map(|p| p.values.clone()).unwrap_or_default(),
            input_size: size,
        })
    }

    fn looper_flags(&self, package: Option<&ResourcePackage>) -> Result<Vec<ArgPair>, ResolutionFailure> {
        let required = |key: &str| -> Result<String, ResolutionFailure> {
            let value = package.and_then(|p| p.get(key)).filter(|v| !v.is_empty());
            value.map(str::to_string).ok_or_else(|| ResolutionFailure::InvalidResourceSpec {
                package: package.map(|p| p.name.clone()),
                key: key.to_string(),
                reason: "is required when looper_args is enabled".to_string(),
            })
        };

        let cores = required("cores")?;
        let mem = required("mem")?;

        let mut flags = Vec::with_capacity(3);
        if let Some(config) = &self.project_config {
            flags.push(ArgPair::new(CONFIG_FLAG, config.display().to_string()));
        }
        flags.push(ArgPair::new(CORES_FLAG, cores));
        flags.push(ArgPair::new(MEMORY_FLAG, mem));
        Ok(flags)
    }
}
