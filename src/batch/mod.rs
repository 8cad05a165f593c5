//! Batch resolution of samples against an interface.
//!
//! # Architecture
//!
//! ```text
//! samples x pipelines ──▶ dispatch (Semaphore) ──▶ spawn_blocking(resolve)
//!                                                          │
//!                          BatchReport ◀── sort ◀── mpsc ◀─┘
//! ```
//!
//! A failing pair is recorded in the report and never affects other pairs.
//! Cancelling stops dispatch; pairs already running are still reported.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use piface::batch::{BatchConfig, BatchOrchestrator};
//! use piface::probe::{FsProber, NullDetector};
//!
//! let orchestrator = BatchOrchestrator::new(
//!     Arc::new(interface),
//!     Arc::new(FsProber),
//!     Arc::new(NullDetector),
//!     BatchConfig::from_env()?,
//! )?;
//! let report = orchestrator.run(samples).await;
//! for line in report.summary_lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod config;
pub mod orchestrator;
pub mod report;

pub use config::{BatchConfig, ConfigError};
pub use orchestrator::{BatchError, BatchOrchestrator, CancelHandle};
pub use report::{BatchReport, PairKey, PairOutcome, PairResult};
