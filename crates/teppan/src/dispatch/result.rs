use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::dispatch::{Outcome, Prediction};
use crate::resource::ExecutionPath;
use crate::time::serialize_millis;

/// # DispatchResult
///
/// The record of one dispatched request, immutable once produced.
///
/// Three durations describe where the time went:
///
/// * `queue_delay` - waiting for an admission permit
/// * `lock_wait` - holding a permit, waiting for the exclusive resource
/// * `compute_latency` - holding the exclusive resource
///
/// `inflight` is the number of permit holders left right after this request
/// released its own permit.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub(crate) request_id: Uuid,

    #[serde(flatten)]
    pub(crate) outcome: Outcome,

    pub(crate) execution_path: ExecutionPath,

    #[serde(rename = "queued_ms", serialize_with = "serialize_millis")]
    pub(crate) queue_delay: Duration,

    #[serde(rename = "lock_wait_ms", serialize_with = "serialize_millis")]
    pub(crate) lock_wait: Duration,

    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub(crate) compute_latency: Duration,

    pub(crate) inflight: usize,

    #[serde(rename = "when")]
    pub(crate) completed_at: DateTime<Utc>,
}

impl DispatchResult {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_completed()
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.outcome.prediction()
    }

    pub fn top_index(&self) -> Option<usize> {
        self.prediction().map(Prediction::top_index)
    }

    pub fn top_score(&self) -> Option<f32> {
        self.prediction().map(Prediction::top_score)
    }

    pub fn execution_path(&self) -> ExecutionPath {
        self.execution_path
    }

    pub fn queue_delay(&self) -> Duration {
        self.queue_delay
    }

    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    pub fn compute_latency(&self) -> Duration {
        self.compute_latency
    }

    /// Time from holding a permit to releasing the resource
    pub fn service_time(&self) -> Duration {
        self.lock_wait + self.compute_latency
    }

    pub fn inflight(&self) -> usize {
        self.inflight
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// Several tensors served back-to-back under one permit and one hold of the
/// resource. Outcomes are in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub(crate) batch_id: Uuid,

    pub(crate) outcomes: Vec<Outcome>,

    pub(crate) execution_path: ExecutionPath,

    #[serde(rename = "queued_ms", serialize_with = "serialize_millis")]
    pub(crate) queue_delay: Duration,

    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub(crate) compute_latency: Duration,

    #[serde(rename = "when")]
    pub(crate) completed_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Top class per input, `None` where that input failed
    pub fn top_indices(&self) -> Vec<Option<usize>> {
        self.outcomes
            .iter()
            .map(|outcome| outcome.prediction().map(Prediction::top_index))
            .collect()
    }

    pub fn execution_path(&self) -> ExecutionPath {
        self.execution_path
    }

    pub fn queue_delay(&self) -> Duration {
        self.queue_delay
    }

    /// Hold time for the whole batch
    pub fn compute_latency(&self) -> Duration {
        self.compute_latency
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}
