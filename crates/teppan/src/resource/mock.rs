use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use crate::error::ResourceError;
use crate::resource::{ExclusiveResource, ExecutionPath};
use crate::tensor::{InputTensor, ModelShape};

type Respond = dyn Fn(usize, &InputTensor) -> Result<Vec<f32>, ResourceError> + Send + Sync;

/// Shared view into what the mock saw, kept by the test after the mock
/// itself has been moved into a dispatcher.
#[derive(Default)]
pub struct Probe {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    torn_down: AtomicBool,
    holds: Mutex<Vec<(Instant, Instant)>>,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `run` calls ever observed
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// `(start, end)` of every completed `run`, in completion order
    pub fn holds(&self) -> Vec<(Instant, Instant)> {
        self.holds.lock().unwrap().clone()
    }
}

pub struct MockResource {
    shape: ModelShape,
    path: ExecutionPath,
    delay: Duration,
    respond: Arc<Respond>,
    probe: Arc<Probe>,
}

impl MockResource {
    /// A 2x2 input, 4-class model answering `[0.1, 0.7, 0.15, 0.05]`
    pub fn new(delay: Duration) -> Self {
        Self {
            shape: ModelShape::new(2, 2, 4),
            path: ExecutionPath::Cpu,
            delay,
            respond: Arc::new(|_, _| Ok(vec![0.1, 0.7, 0.15, 0.05])),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn with_path(mut self, path: ExecutionPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_respond<F>(mut self, respond: F) -> Self
    where F: Fn(usize, &InputTensor) -> Result<Vec<f32>, ResourceError> + Send + Sync + 'static
    {
        self.respond = Arc::new(respond);
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        self.probe.clone()
    }
}

#[async_trait]
impl ExclusiveResource for MockResource {
    fn shape(&self) -> ModelShape {
        self.shape
    }

    fn execution_path(&self) -> ExecutionPath {
        self.path
    }

    async fn run(&mut self, tensor: &InputTensor) -> Result<Vec<f32>, ResourceError> {
        let call = self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);

        let start = Instant::now();
        tokio::time::sleep(self.delay).await;

        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        self.probe.holds.lock().unwrap().push((start, Instant::now()));

        // last, so a panicking responder leaves the probe consistent
        (self.respond)(call, tensor)
    }

    async fn teardown(&mut self) {
        self.probe.torn_down.store(true, Ordering::SeqCst);
    }
}
