//! piface: pipeline interface resolution.
//!
//! Reads a pipeline interface (which pipelines exist, how sample attributes
//! map onto command-line flags, which resource package fits which input
//! size) and resolves every (sample, pipeline) pair into a concrete
//! [`Invocation`] or a typed [`ResolutionFailure`].

pub mod batch;
pub mod cli;
pub mod error;
pub mod interface;
pub mod probe;
pub mod resolve;
pub mod resources;
pub mod sample;

pub use batch::{BatchConfig, BatchError, BatchOrchestrator, BatchReport, CancelHandle, PairOutcome};
pub use error::{FailureKind, InterfaceError, ResolutionFailure};
pub use interface::{PipelineInterface, PipelineSpec};
pub use probe::{FsProber, NgsDetector, SizeProber};
pub use resolve::{Invocation, InvocationBuilder, Resolver};
pub use resources::{ResourcePackage, ResourcePolicy};
pub use sample::Sample;
