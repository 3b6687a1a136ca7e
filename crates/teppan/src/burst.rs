//! # Burst fan-out
//!
//! A burst expands one logical request into `n` independent dispatches that
//! run concurrently. Launch is unbounded by default: throttling is the
//! admission gate's job, and the exclusive resource still serves one request
//! at a time, so a burst takes at least `n` times the single-request compute
//! latency however large the gate is.
//!
//! Results are collected by request index. Slot `i` always holds request `i`,
//! whatever order the tasks finish in.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::dispatch::{panic_message, DispatchResult, Dispatcher, Outcome};
use crate::error::{DispatchError, ResourceError};
use crate::metrics::LatencySamples;
use crate::resource::ExclusiveResource;
use crate::tensor::InputTensor;
use crate::time::serialize_millis;

/// The fully populated result of one burst.
#[derive(Debug, Clone, Serialize)]
pub struct BurstJob {
    job_id: Uuid,

    count: usize,

    results: Vec<DispatchResult>,

    #[serde(rename = "total_ms", serialize_with = "serialize_millis")]
    total: Duration,

    /// Admission capacity when the burst was issued
    parallel: usize,
}

impl BurstJob {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slot `i` is request `i`.
    pub fn results(&self) -> &[DispatchResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<DispatchResult> {
        self.results
    }

    /// Wall time from launch until the last slot was filled
    pub fn total_elapsed(&self) -> Duration {
        self.total
    }

    pub fn parallel(&self) -> usize {
        self.parallel
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.count - self.succeeded()
    }

    /// Completed requests per second over the whole burst.
    pub fn throughput(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs == 0.0 { 0.0 } else { self.succeeded() as f64 / secs }
    }

    /// Compute latency of every successful slot, in slot order.
    pub fn compute_samples(&self) -> LatencySamples {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(DispatchResult::compute_latency)
            .collect()
    }

    /// Queue delay of every slot, in slot order.
    pub fn queue_samples(&self) -> LatencySamples {
        self.results.iter().map(DispatchResult::queue_delay).collect()
    }
}

/// # BurstCoordinator
///
/// Fans a single tensor out into `n` concurrent dispatches on a shared
/// [`Dispatcher`].
pub struct BurstCoordinator<R> {
    dispatcher: Arc<Dispatcher<R>>,
}

impl<R: ExclusiveResource> BurstCoordinator<R> {
    pub fn new(dispatcher: Arc<Dispatcher<R>>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<R>> {
        &self.dispatcher
    }

    /// Dispatches `tensor` `n` times concurrently and waits for every slot.
    ///
    /// # Parameters
    ///
    /// * `tensor` - Shared by every request in the burst
    /// * `n` - Number of requests, `1..=max_burst`
    ///
    /// # Returns
    ///
    /// A [`BurstJob`] with exactly `n` slots. Slots whose request failed, was
    /// not admitted, or whose task died carry that in their [`Outcome`]; one
    /// bad slot never aborts its siblings.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidBurstSize`] or a shape mismatch, both before
    /// any task is launched.
    pub async fn burst(&self, tensor: &InputTensor, n: usize) -> Result<BurstJob, DispatchError> {
        let max = self.dispatcher.config().max_burst;
        if n == 0 || n > max {
            return Err(DispatchError::InvalidBurstSize { n, max });
        }
        tensor.check(self.dispatcher.shape())?;

        let job_id = Uuid::new_v4();
        let parallel = self.dispatcher.capacity();
        let launch_cap = self.dispatcher.config().launch_cap.unwrap_or(n);
        debug!(%job_id, n, parallel, launch_cap, "burst started");

        let tensor = Arc::new(tensor.clone());
        let start = Instant::now();
        let results = fan_out(
            n,
            launch_cap,
            |_| {
                let dispatcher = self.dispatcher.clone();
                let tensor = tensor.clone();
                async move { dispatcher.dispatch_unchecked(&tensor).await }
            },
            |index, err| self.lost_slot(job_id, index, err),
        ).await;
        let total = start.elapsed();

        let job = BurstJob { job_id, count: n, results, total, parallel };
        debug!(
            %job_id,
            n,
            succeeded = job.succeeded(),
            total_ms = crate::time::millis(total),
            "burst complete"
        );
        Ok(job)
    }

    fn lost_slot(&self, job_id: Uuid, index: usize, err: JoinError) -> DispatchResult {
        let error = if err.is_panic() {
            ResourceError::Panicked(panic_message(err.into_panic().as_ref()))
        } else {
            ResourceError::Cancelled
        };
        warn!(%job_id, slot = index, %error, "burst task died");
        DispatchResult {
            request_id: Uuid::new_v4(),
            outcome: Outcome::Failed { error },
            execution_path: self.dispatcher.execution_path(),
            queue_delay: Duration::ZERO,
            lock_wait: Duration::ZERO,
            compute_latency: Duration::ZERO,
            inflight: self.dispatcher.inflight(),
            completed_at: Utc::now(),
        }
    }
}

/// Spawns `task(i)` for every `i` in `0..n`, with at most `launch_cap` tasks
/// alive at once, and returns the outputs indexed by `i`.
///
/// A task that panics or is cancelled is replaced by `recover(i, err)`.
pub(crate) async fn fan_out<T, F, Fut, E>(n: usize, launch_cap: usize, task: F, recover: E) -> Vec<T>
where F: Fn(usize) -> Fut,
      Fut: Future<Output = T> + Send + 'static,
      T: Send + 'static,
      E: Fn(usize, JoinError) -> T
{
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(n).collect();

    let mut completions = stream::iter(0..n)
        .map(|index| {
            let handle = tokio::spawn(task(index));
            async move { (index, handle.await) }
        })
        .buffer_unordered(launch_cap.max(1));

    while let Some((index, joined)) = completions.next().await {
        slots[index] = Some(joined.unwrap_or_else(|err| recover(index, err)));
    }

    // every index in 0..n completes exactly once
    slots.into_iter().flatten().collect()
}
