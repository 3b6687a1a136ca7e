use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor};
use tracing::{info, warn};
use crate::error::ResourceError;
use crate::resource::{ExclusiveResource, ExecutionPath};
use crate::tensor::{InputTensor, ModelShape};

/// Any candle [`Module`] served as an exclusive resource.
///
/// Inputs are handed to the module as a `(1, height, width)` `f32` tensor.
/// Whatever the module returns is flattened and read back as `f32` scores.
pub struct CandleResource<M> {
    model: M,
    device: Device,
    shape: ModelShape,
}

impl<M> CandleResource<M>
where M: Module + Send + 'static
{
    pub fn new(model: M, shape: ModelShape, device: Device) -> Self {
        Self { model, device, shape }
    }

    /// Mounts on the first CUDA device if there is one, otherwise on the CPU.
    pub fn mount(model: M, shape: ModelShape) -> Self {
        let device = match Device::cuda_if_available(0) {
            Ok(device) => device,
            Err(error) => {
                warn!(%error, "accelerator unavailable, falling back to cpu");
                Device::Cpu
            }
        };
        if device.is_cpu() {
            info!("serving on cpu");
        }
        Self::new(model, shape, device)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn forward(&self, tensor: &InputTensor) -> candle_core::Result<Vec<f32>> {
        let input = Tensor::from_slice(tensor.as_slice(), (1, tensor.height(), tensor.width()), &self.device)?;
        self.model
            .forward(&input)?
            .flatten_all()?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}

#[async_trait]
impl<M> ExclusiveResource for CandleResource<M>
where M: Module + Send + 'static
{
    fn shape(&self) -> ModelShape {
        self.shape
    }

    fn execution_path(&self) -> ExecutionPath {
        if self.device.is_cpu() {
            ExecutionPath::Cpu
        } else {
            ExecutionPath::Accelerator
        }
    }

    async fn run(&mut self, tensor: &InputTensor) -> Result<Vec<f32>, ResourceError> {
        self.forward(tensor)
            .map_err(|error| ResourceError::Backend(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::dispatch::Dispatcher;

    fn first_three(xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.flatten_all()?.narrow(0, 0, 3)
    }

    #[tokio::test]
    async fn test_run_on_cpu() {
        let shape = ModelShape::new(2, 2, 3);
        let mut resource = CandleResource::new(first_three, shape, Device::Cpu);
        assert_eq!(resource.execution_path(), ExecutionPath::Cpu);

        let input = InputTensor::from_flat(&shape, &[0.25, 0.5, 0.75, 1.0]).unwrap();
        let output = resource.run(&input).await.unwrap();
        assert_eq!(output, vec![0.25, 0.5, 0.75]);
    }

    #[tokio::test]
    async fn test_backend_error_is_reported() {
        let failing = |_: &Tensor| -> candle_core::Result<Tensor> {
            Err(candle_core::Error::Msg("boom".to_string()))
        };
        let mut resource = CandleResource::new(failing, ModelShape::new(2, 2, 3), Device::Cpu);

        let input = InputTensor::zeros(&ModelShape::new(2, 2, 3));
        match resource.run(&input).await {
            Err(ResourceError::Backend(message)) => assert!(message.contains("boom")),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_through_candle() {
        let shape = ModelShape::new(2, 2, 3);
        let resource = CandleResource::new(first_three, shape, Device::Cpu);
        let dispatcher = Dispatcher::mount(resource, DispatchConfig::default()).await.unwrap();

        let input = InputTensor::from_flat(&shape, &[0.1, 0.9, 0.3, 0.0]).unwrap();
        let result = dispatcher.dispatch(&input).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.top_index(), Some(1));
        assert_eq!(result.execution_path(), ExecutionPath::Cpu);
    }
}
