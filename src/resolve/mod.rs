//! Per-pair resolution: from a sample and a pipeline to an [`Invocation`].
//!
//! Resolution runs in this order:
//!
//! 1. **NGS detection** (only if the pipeline declares `ngs_input_files`),
//!    filling `read_length`/`read_type` the sample does not set itself
//! 2. **Arguments**: required then optional flags, in declaration order
//! 3. **Input size**: required and optional input files summed
//! 4. **Resource package**: best-fit selection on the size in GB
//! 5. **Invocation**: path expansion, looper flags, resource forwarding
//!
//! Any step may fail with a [`ResolutionFailure`]; the pair is then skipped.

pub mod arguments;
pub mod env;
pub mod invocation;

pub use arguments::{resolve_arguments, ArgPair};
pub use env::{expand, EnvSnapshot};
pub use invocation::{Invocation, InvocationBuilder};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ResolutionFailure;
use crate::interface::PipelineSpec;
use crate::probe::{aggregate_input_size, split_paths, NgsDetector, SizeProber};
use crate::sample::Sample;

/// Resolves (sample, pipeline) pairs. Stateless apart from its collaborators.
#[derive(Clone)]
pub struct Resolver {
    builder: InvocationBuilder,
    prober: Arc<dyn SizeProber>,
    detector: Arc<dyn NgsDetector>,
}

impl Resolver {
    pub fn new(
        builder: InvocationBuilder,
        prober: Arc<dyn SizeProber>,
        detector: Arc<dyn NgsDetector>,
    ) -> Self {
        Self {
            builder,
            prober,
            detector,
        }
    }

    /// Resolves one pair. Blocking: it probes the filesystem.
    pub fn resolve(&self, spec: &PipelineSpec, sample: &Sample) -> Result<Invocation, ResolutionFailure> {
        let mut attributes = sample.attributes().clone();
        if !spec.ngs_input_files.is_empty() {
            self.detect_ngs(spec, sample, &mut attributes);
        }

        let args = resolve_arguments(spec, &attributes)?;
        let size = aggregate_input_size(spec, &attributes, self.prober.as_ref())?;

        let package = match &spec.resources {
            Some(policy) => Some(policy.select(size.gigabytes).map_err(|e| {
                ResolutionFailure::InvalidResourceSpec {
                    package: None,
                    key: "file_size".to_string(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        debug!(
            sample = %sample.name(),
            pipeline = %spec.key,
            size_gb = size.gigabytes,
            package = package.map(|p| p.name.as_str()).unwrap_or("<local>"),
            "Selected resource package"
        );

        self.builder.build(spec, sample, args, size, package)
    }

    fn detect_ngs(
        &self,
        spec: &PipelineSpec,
        sample: &Sample,
        attributes: &mut std::collections::BTreeMap<String, String>,
    ) {
        let paths: Vec<PathBuf> = spec
            .ngs_input_files
            .iter()
            .filter_map(|attribute| attributes.get(attribute))
            .flat_map(|value| split_paths(value))
            .map(PathBuf::from)
            .collect();
        if paths.is_empty() {
            return;
        }

        match self.detector.detect(&paths) {
            Ok(detected) => detected.fill_missing(attributes),
            Err(e) => warn!(
                sample = %sample.name(),
                pipeline = %spec.key,
                error = %e,
                "NGS attribute detection failed"
            ),
        }
    }
}
