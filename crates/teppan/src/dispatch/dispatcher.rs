use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use chrono::Utc;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::DispatchConfig;
use crate::dispatch::{BatchResult, DispatchResult, Outcome, Prediction};
use crate::error::{AdmissionError, ConfigError, DispatchError, ResourceError, ShapeError};
use crate::gate::AdmissionGate;
use crate::health::{Health, HealthStatus, ModelInfo};
use crate::resource::{Exclusive, ExclusiveResource, ExecutionPath};
use crate::tensor::{InputTensor, ModelShape};

/// # Dispatcher
///
/// Serves inference requests against one mounted [`ExclusiveResource`].
///
/// Two controls compose here. The [`AdmissionGate`] bounds how many requests
/// may be in flight at once (`max_inflight`), which bounds backlog and the
/// memory held by waiting requests. The [`Exclusive`] token bounds how many
/// of those may drive the resource at once, which is always one.
///
/// A dispatcher is safe to share across tasks; wrap it in an `Arc` to hand it
/// to a [`BurstCoordinator`](crate::burst::BurstCoordinator).
pub struct Dispatcher<R> {
    resource: Exclusive<R>,
    gate: AdmissionGate,
    shape: ModelShape,
    execution_path: ExecutionPath,
    config: DispatchConfig,
    started: Instant,
    started_at: chrono::DateTime<Utc>,
    torn_down: AtomicBool,
}

impl<R: ExclusiveResource> Dispatcher<R> {
    /// Mounts `resource` behind a new dispatcher.
    ///
    /// The model shape and execution path are read once here and treated as
    /// fixed afterwards. With `config.warmup` set, one inference runs on an
    /// all-zero tensor before the dispatcher is returned; a failed warm-up is
    /// logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`DispatchConfig::validate`].
    pub async fn mount(mut resource: R, config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let shape = resource.shape();
        let execution_path = resource.execution_path();
        info!(
            width = shape.width,
            height = shape.height,
            classes = shape.classes,
            execution_path = %execution_path,
            max_inflight = config.max_inflight,
            "mounting resource"
        );

        if config.warmup {
            let warmup = Instant::now();
            match run_guarded(&mut resource, &InputTensor::zeros(&shape)).await {
                Ok(_) => debug!(elapsed_ms = crate::time::millis(warmup.elapsed()), "warm-up complete"),
                Err(error) => warn!(%error, "warm-up inference failed"),
            }
        }

        Ok(Self {
            resource: Exclusive::new(resource),
            gate: AdmissionGate::new(config.max_inflight),
            shape,
            execution_path,
            config,
            started: Instant::now(),
            started_at: Utc::now(),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn shape(&self) -> &ModelShape {
        &self.shape
    }

    pub fn execution_path(&self) -> ExecutionPath {
        self.execution_path
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Admission gate capacity.
    pub fn capacity(&self) -> usize {
        self.gate.capacity()
    }

    /// Requests currently holding an admission permit.
    pub fn inflight(&self) -> usize {
        self.gate.inflight().get()
    }

    /// Runs one request.
    ///
    /// # Steps
    ///
    /// 1. Check `tensor` against the mounted shape
    /// 2. Wait for an admission permit (queue delay)
    /// 3. Wait for the exclusive resource (lock wait)
    /// 4. Run the resource while holding it (compute latency)
    /// 5. Pick the top class, release the permit, report the remaining backlog
    ///
    /// # Errors
    ///
    /// Only a shape mismatch, which is detected before admission. Resource
    /// failures and admission failures are reported in the result's
    /// [`Outcome`].
    pub async fn dispatch(&self, tensor: &InputTensor) -> Result<DispatchResult, ShapeError> {
        tensor.check(&self.shape)?;
        Ok(self.dispatch_unchecked(tensor).await)
    }

    /// [`dispatch`](Self::dispatch) without the shape check, for callers that
    /// validated once up front.
    pub(crate) async fn dispatch_unchecked(&self, tensor: &InputTensor) -> DispatchResult {
        let request_id = Uuid::new_v4();

        let permit = match self.gate.acquire(self.config.admission_timeout).await {
            Ok(permit) => permit,
            Err(reason) => return self.not_admitted(request_id, reason),
        };
        let queue_delay = permit.waited();

        let requested = Instant::now();
        let (output, lock_wait, compute_latency) = self.resource
            .with_exclusive_access(|mut resource| async move {
                let lock_wait = requested.elapsed();
                let held = Instant::now();
                let output = run_guarded(&mut *resource, tensor).await;
                (output, lock_wait, held.elapsed())
            })
            .await;

        let outcome: Outcome = output
            .and_then(|output| Prediction::from_output(output, self.shape.classes))
            .into();
        if let Outcome::Failed { error } = &outcome {
            warn!(%request_id, %error, "inference failed");
        }

        let inflight = permit.release();
        debug!(
            %request_id,
            queued_ms = crate::time::millis(queue_delay),
            lock_wait_ms = crate::time::millis(lock_wait),
            latency_ms = crate::time::millis(compute_latency),
            inflight,
            "dispatch complete"
        );

        DispatchResult {
            request_id,
            outcome,
            execution_path: self.execution_path,
            queue_delay,
            lock_wait,
            compute_latency,
            inflight,
            completed_at: Utc::now(),
        }
    }

    /// Runs several tensors in order under a single admission permit and a
    /// single hold of the resource. Nothing else reaches the resource until
    /// the whole batch has finished.
    ///
    /// # Errors
    ///
    /// [`DispatchError::EmptyBatch`] or [`DispatchError::BatchItem`] for the
    /// first tensor with the wrong shape, both before admission.
    pub async fn dispatch_batch(&self, tensors: &[InputTensor]) -> Result<BatchResult, DispatchError> {
        if tensors.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        for (index, tensor) in tensors.iter().enumerate() {
            tensor
                .check(&self.shape)
                .map_err(|source| DispatchError::BatchItem { index, source })?;
        }

        let batch_id = Uuid::new_v4();
        let permit = match self.gate.acquire(self.config.admission_timeout).await {
            Ok(permit) => permit,
            Err(reason) => {
                warn!(%batch_id, %reason, size = tensors.len(), "batch not admitted");
                let waited = match &reason {
                    AdmissionError::TimedOut { waited } => *waited,
                    AdmissionError::Closed => Duration::ZERO,
                };
                return Ok(BatchResult {
                    batch_id,
                    outcomes: vec![Outcome::NotAdmitted { reason }; tensors.len()],
                    execution_path: self.execution_path,
                    queue_delay: waited,
                    compute_latency: Duration::ZERO,
                    completed_at: Utc::now(),
                });
            }
        };
        let queue_delay = permit.waited();

        let classes = self.shape.classes;
        let (outcomes, compute_latency) = self.resource
            .with_exclusive_access(|mut resource| async move {
                let held = Instant::now();
                let mut outcomes = Vec::with_capacity(tensors.len());
                for tensor in tensors {
                    let outcome: Outcome = run_guarded(&mut *resource, tensor)
                        .await
                        .and_then(|output| Prediction::from_output(output, classes))
                        .into();
                    outcomes.push(outcome);
                }
                (outcomes, held.elapsed())
            })
            .await;

        let failed = outcomes.iter().filter(|outcome| !outcome.is_completed()).count();
        if failed > 0 {
            warn!(%batch_id, failed, size = tensors.len(), "batch items failed");
        }
        let inflight = permit.release();
        debug!(
            %batch_id,
            size = tensors.len(),
            queued_ms = crate::time::millis(queue_delay),
            latency_ms = crate::time::millis(compute_latency),
            inflight,
            "batch complete"
        );

        Ok(BatchResult {
            batch_id,
            outcomes,
            execution_path: self.execution_path,
            queue_delay,
            compute_latency,
            completed_at: Utc::now(),
        })
    }

    pub fn health(&self) -> Health {
        Health {
            status: if self.gate.is_closed() { HealthStatus::Closed } else { HealthStatus::Ok },
            uptime: self.started.elapsed(),
            inflight: self.gate.inflight().get(),
            peak_inflight: self.gate.inflight().peak(),
            capacity: self.gate.capacity(),
            execution_path: self.execution_path,
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            input: [self.shape.width, self.shape.height],
            classes: self.shape.classes,
            execution_path: self.execution_path,
            capacity: self.gate.capacity(),
            max_burst: self.config.max_burst,
            started_at: self.started_at,
        }
    }

    /// Initiates a graceful shutdown.
    ///
    /// 1. Closes the admission gate, so waiting and future requests come back
    ///    as [`Outcome::NotAdmitted`]
    /// 2. Waits behind requests already queued on the resource
    /// 3. Tears the resource down, once
    pub async fn shutdown(&self) {
        self.gate.close();
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(inflight = self.inflight(), "admission closed, draining resource");
        self.resource
            .with_exclusive_access(|mut resource| async move { resource.teardown().await })
            .await;
        info!("resource torn down");
    }

    /// Consumes the dispatcher and hands the resource back.
    pub fn into_resource(self) -> R {
        self.resource.into_inner()
    }

    fn not_admitted(&self, request_id: Uuid, reason: AdmissionError) -> DispatchResult {
        let queue_delay = match &reason {
            AdmissionError::TimedOut { waited } => {
                warn!(%request_id, waited_ms = crate::time::millis(*waited), "admission timed out");
                *waited
            }
            AdmissionError::Closed => {
                debug!(%request_id, "admission gate closed");
                Duration::ZERO
            }
        };
        DispatchResult {
            request_id,
            outcome: Outcome::NotAdmitted { reason },
            execution_path: self.execution_path,
            queue_delay,
            lock_wait: Duration::ZERO,
            compute_latency: Duration::ZERO,
            inflight: self.inflight(),
            completed_at: Utc::now(),
        }
    }
}

/// Runs the resource, turning a panic inside it into a [`ResourceError`].
async fn run_guarded<R: ExclusiveResource>(resource: &mut R, tensor: &InputTensor) -> Result<Vec<f32>, ResourceError> {
    AssertUnwindSafe(resource.run(tensor))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ResourceError::Panicked(panic_message(panic.as_ref()))))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
