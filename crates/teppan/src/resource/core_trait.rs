use std::fmt;
use async_trait::async_trait;
use serde::Serialize;
use crate::error::ResourceError;
use crate::tensor::{InputTensor, ModelShape};

/// Which execution path a mounted resource serves requests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    Cpu,
    Accelerator,
}

impl ExecutionPath {
    pub fn is_accelerated(&self) -> bool {
        matches!(self, ExecutionPath::Accelerator)
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::Cpu => write!(f, "cpu"),
            ExecutionPath::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// A compute resource that can serve exactly one inference at a time.
///
/// This trait represents a model that has been loaded and mounted once for the
/// lifetime of the process. Implementations take `&mut self` in [`run`](Self::run):
/// the resource is not re-entrant, and the dispatcher only ever reaches it
/// through an [`Exclusive`](super::Exclusive) handle, which hands out that
/// mutable borrow to one caller at a time.
///
/// # Implementation Notes
///
/// Implementations should:
/// * Report a [`ModelShape`] that never changes after construction
/// * Return an output vector of exactly `classes` values from `run`
/// * Report failures as [`ResourceError`] instead of panicking
///
/// # Example
///
/// ```ignore
/// use teppan::resource::{ExclusiveResource, ExecutionPath};
/// use async_trait::async_trait;
///
/// struct Doubler;
///
/// #[async_trait]
/// impl ExclusiveResource for Doubler {
///     fn shape(&self) -> ModelShape {
///         ModelShape::new(2, 1, 2)
///     }
///
///     fn execution_path(&self) -> ExecutionPath {
///         ExecutionPath::Cpu
///     }
///
///     async fn run(&mut self, tensor: &InputTensor) -> Result<Vec<f32>, ResourceError> {
///         Ok(tensor.as_slice().iter().map(|v| v * 2.0).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait ExclusiveResource: Send + 'static {
    /// Input dimensions and class count of the mounted model.
    fn shape(&self) -> ModelShape;

    /// The path decided at mount time.
    fn execution_path(&self) -> ExecutionPath;

    /// Runs one forward pass and returns the output vector.
    ///
    /// # Parameters
    ///
    /// * `tensor` - An input already validated against [`shape`](Self::shape)
    ///
    /// # Returns
    ///
    /// `classes` scores, or the reason the pass failed
    async fn run(&mut self, tensor: &InputTensor) -> Result<Vec<f32>, ResourceError>;

    /// Releases whatever the resource holds (device buffers, contexts).
    /// Called once during shutdown after the last request finished.
    async fn teardown(&mut self) {}
}
