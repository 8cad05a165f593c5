//! Concurrent resolution of every (sample, pipeline) pair.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{InterfaceError, ResolutionFailure};
use crate::interface::{PipelineInterface, PipelineSpec};
use crate::probe::{NgsDetector, SizeProber};
use crate::resolve::{EnvSnapshot, Invocation, InvocationBuilder, Resolver};
use crate::sample::Sample;

use super::config::{BatchConfig, ConfigError};
use super::report::{BatchReport, PairKey, PairOutcome, PairResult};

/// Errors that prevent a batch orchestrator from being built.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configuration names pipelines the interface does not declare.
    #[error(transparent)]
    Interface(#[from] InterfaceError),
}

/// Stops a running batch from dispatching further pairs.
///
/// Pairs already dispatched run to completion and are reported.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Completes once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Resolves samples against the pipelines of one interface.
pub struct BatchOrchestrator {
    interface: Arc<PipelineInterface>,
    resolver: Resolver,
    config: BatchConfig,
    pipelines: Vec<String>,
    cancel: CancelHandle,
}

impl BatchOrchestrator {
    /// Creates an orchestrator that expands paths with the process environment.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::Config` if `config` fails validation and
    /// `BatchError::Interface` if `config.pipelines` names a key the
    /// interface does not declare.
    pub fn new(
        interface: Arc<PipelineInterface>,
        prober: Arc<dyn SizeProber>,
        detector: Arc<dyn NgsDetector>,
        config: BatchConfig,
    ) -> Result<Self, BatchError> {
        Self::with_env(interface, prober, detector, config, EnvSnapshot::capture())
    }

    /// Like [`BatchOrchestrator::new`] with an explicit environment snapshot.
    pub fn with_env(
        interface: Arc<PipelineInterface>,
        prober: Arc<dyn SizeProber>,
        detector: Arc<dyn NgsDetector>,
        config: BatchConfig,
        env: EnvSnapshot,
    ) -> Result<Self, BatchError> {
        config.validate()?;

        let pipelines = if config.pipelines.is_empty() {
            interface.pipeline_keys().map(str::to_string).collect()
        } else {
            for key in &config.pipelines {
                interface.get(key)?;
            }
            config.pipelines.clone()
        };

        let mut builder = InvocationBuilder::new(interface.base_dir(), env);
        if let Some(project_config) = &config.project_config {
            builder = builder.with_project_config(project_config);
        }

        Ok(Self {
            resolver: Resolver::new(builder, prober, detector),
            interface,
            config,
            pipelines,
            cancel: CancelHandle::default(),
        })
    }

    /// Handle that stops further dispatch when cancelled.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Pipeline keys this orchestrator runs, in dispatch order.
    pub fn pipelines(&self) -> &[String] {
        &self.pipelines
    }

    /// Resolves a single pair on the calling thread.
    pub fn resolve_pair(
        &self,
        sample: &Sample,
        spec: &PipelineSpec,
    ) -> Result<Invocation, ResolutionFailure> {
        self.resolver.resolve(spec, sample)
    }

    /// Resolves every pair, at most `max_concurrent` at a time.
    ///
    /// Pairs are dispatched sample by sample, pipelines in order. The report
    /// is sorted, so its content does not depend on completion order.
    /// Samples sharing a name each keep their own entries, in input order.
    pub async fn run(&self, samples: Vec<Sample>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_time = Instant::now();

        let mut pairs: Vec<(Arc<Sample>, Arc<PipelineSpec>)> =
            Vec::with_capacity(samples.len() * self.pipelines.len());
        let specs: Vec<Arc<PipelineSpec>> = self
            .pipelines
            .iter()
            .filter_map(|key| self.interface.get(key).ok())
            .map(|spec| Arc::new(spec.clone()))
            .collect();
        let mut seen = HashSet::new();
        for sample in samples {
            if !seen.insert(sample.name().to_string()) {
                warn!(sample = %sample.name(), "Duplicate sample name in batch");
            }
            let sample = Arc::new(sample);
            for spec in &specs {
                pairs.push((Arc::clone(&sample), Arc::clone(spec)));
            }
        }

        info!(
            run_id = %run_id,
            pairs = pairs.len(),
            max_concurrent = self.config.max_concurrent,
            "Starting batch resolution"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, PairResult)>();
        let mut not_dispatched = Vec::new();
        let mut pending = pairs.into_iter().enumerate();

        while let Some((index, (sample, spec))) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit.filter(|_| !self.cancel.is_cancelled()) else {
                not_dispatched.push(PairKey::new(sample.name(), &spec.key));
                not_dispatched.extend(
                    pending
                        .by_ref()
                        .map(|(_, (sample, spec))| PairKey::new(sample.name(), &spec.key)),
                );
                break;
            };

            let resolver = self.resolver.clone();
            let timeout = self.config.pair_timeout;
            let tx = tx.clone();
            tokio::spawn(async move {
                let key = PairKey::new(sample.name(), &spec.key);
                let blocking = {
                    let spec = Arc::clone(&spec);
                    let sample = Arc::clone(&sample);
                    tokio::task::spawn_blocking(move || resolver.resolve(&spec, &sample))
                };

                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, blocking).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(
                                sample = %key.sample,
                                pipeline = %key.pipeline,
                                timeout_ms = limit.as_millis() as u64,
                                "Pair resolution timed out"
                            );
                            Ok(Err(ResolutionFailure::ResolutionTimeout {
                                timeout_ms: limit.as_millis() as u64,
                            }))
                        }
                    },
                    None => blocking.await,
                };

                let outcome = match joined {
                    Ok(Ok(invocation)) => {
                        debug!(
                            sample = %key.sample,
                            pipeline = %key.pipeline,
                            "Pair resolved"
                        );
                        PairOutcome::Resolved(invocation)
                    }
                    Ok(Err(failure)) => {
                        warn!(
                            sample = %key.sample,
                            pipeline = %key.pipeline,
                            kind = %failure.kind(),
                            error = %failure,
                            "Skipping pair"
                        );
                        PairOutcome::Skipped(failure)
                    }
                    Err(e) => {
                        warn!(
                            sample = %key.sample,
                            pipeline = %key.pipeline,
                            error = %e,
                            "Resolution task failed"
                        );
                        PairOutcome::Skipped(ResolutionFailure::SizeProbeError {
                            path: spec.path.clone(),
                            message: format!("resolution task failed: {}", e),
                        })
                    }
                };

                drop(permit);
                let _ = tx.send((index, PairResult { key, outcome }));
            });
        }
        drop(tx);

        let mut results = BTreeMap::new();
        while let Some((index, result)) = rx.recv().await {
            results.insert(index, result);
        }

        let report = BatchReport::new(
            run_id,
            started_at,
            results.into_values().collect(),
            not_dispatched,
        );
        info!(
            run_id = %run_id,
            resolved = report.resolved_count(),
            skipped = report.skipped_count(),
            not_dispatched = report.not_dispatched.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Batch resolution finished"
        );
        report
    }
}
