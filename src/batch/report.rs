//! Aggregated outcome of a batch run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FailureKind, ResolutionFailure};
use crate::resolve::Invocation;

/// Identifies one (sample, pipeline) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub sample: String,
    pub pipeline: String,
}

impl PairKey {
    pub fn new(sample: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
            pipeline: pipeline.into(),
        }
    }
}

/// What happened to one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PairOutcome {
    Resolved(Invocation),
    Skipped(ResolutionFailure),
}

/// One entry of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    #[serde(flatten)]
    pub key: PairKey,
    pub outcome: PairOutcome,
}

/// Immutable result of a batch run, sorted by (sample, pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<PairResult>,
    /// Whether the run was cancelled before every pair was dispatched.
    pub cancelled: bool,
    /// Pairs never dispatched because of cancellation.
    pub not_dispatched: Vec<PairKey>,
}

impl BatchReport {
    /// `results` arrive in dispatch order; entries sharing a key keep it.
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        mut results: Vec<PairResult>,
        mut not_dispatched: Vec<PairKey>,
    ) -> Self {
        results.sort_by(|a, b| a.key.cmp(&b.key));
        not_dispatched.sort();
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled: !not_dispatched.is_empty(),
            results,
            not_dispatched,
        }
    }

    /// Outcome for one pair, if it ran. With duplicate sample names this is
    /// the first one dispatched.
    pub fn outcome(&self, sample: &str, pipeline: &str) -> Option<&PairOutcome> {
        self.results
            .iter()
            .find(|r| r.key.sample == sample && r.key.pipeline == pipeline)
            .map(|r| &r.outcome)
    }

    /// Successful invocations in report order.
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.results.iter().filter_map(|r| match &r.outcome {
            PairOutcome::Resolved(invocation) => Some(invocation),
            PairOutcome::Skipped(_) => None,
        })
    }

    /// Skipped pairs with their failures, in report order.
    pub fn failures(&self) -> impl Iterator<Item = (&PairKey, &ResolutionFailure)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            PairOutcome::Skipped(failure) => Some((&r.key, failure)),
            PairOutcome::Resolved(_) => None,
        })
    }

    pub fn resolved_count(&self) -> usize {
        self.invocations().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.failures().count()
    }

    /// Number of skipped pairs per failure kind.
    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for (_, failure) in self.failures() {
            *counts.entry(failure.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// One line per skipped pair: sample, pipeline, kind and offending key.
    pub fn summary_lines(&self) -> Vec<String> {
        self.failures()
            .map(|(key, failure)| {
                let offending = failure.offending_key();
                if offending.is_empty() {
                    format!("{} / {}: {}", key.sample, key.pipeline, failure.kind())
                } else {
                    format!(
                        "{} / {}: {} [{}]",
                        key.sample,
                        key.pipeline,
                        failure.kind(),
                        offending
                    )
                }
            })
            .collect()
    }
}
