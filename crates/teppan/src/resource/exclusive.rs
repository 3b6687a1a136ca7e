use std::future::Future;
use tokio::sync::{Mutex, MutexGuard};
use super::ExclusiveResource;

/// # Exclusive
///
/// The ownership token for the mounted resource.
///
/// There is exactly one `Exclusive` per resource and it is deliberately not
/// `Clone`: the dispatcher owns it and every access goes through
/// [`with_exclusive_access`](Self::with_exclusive_access), which holds a
/// fair (FIFO) async mutex for the duration of the supplied future. A holder
/// must finish before the next caller, including the same logical caller,
/// gets in.
pub struct Exclusive<R> {
    inner: Mutex<R>,
}

impl<R: ExclusiveResource> Exclusive<R> {
    pub fn new(resource: R) -> Self {
        Self { inner: Mutex::new(resource) }
    }

    /// Waits for sole access to the resource and runs `f` with it.
    ///
    /// The guard is moved into `f`; the lock is released when the future
    /// returned by `f` completes (or is dropped).
    ///
    /// # Parameters
    ///
    /// * `f` - Receives the guard and returns the work to do while holding it
    ///
    /// # Returns
    ///
    /// Whatever the future produced by `f` resolves to
    pub async fn with_exclusive_access<'a, F, Fut, T>(&'a self, f: F) -> T
    where F: FnOnce(MutexGuard<'a, R>) -> Fut,
          Fut: Future<Output = T>
    {
        let guard = self.inner.lock().await;
        f(guard).await
    }

    /// Unwraps the resource, consuming the token.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use crate::resource::mock::MockResource;
    use crate::tensor::InputTensor;

    #[tokio::test(start_paused = true)]
    async fn test_access_is_serialized() {
        let mock = MockResource::new(Duration::from_millis(10));
        let probe = mock.probe();
        let shape = crate::resource::ExclusiveResource::shape(&mock);
        let exclusive = Arc::new(Exclusive::new(mock));

        let handles = (0..8).map(|_| {
            let exclusive = exclusive.clone();
            let tensor = InputTensor::zeros(&shape);
            tokio::spawn(async move {
                exclusive.with_exclusive_access(|mut resource| async move {
                    resource.run(&tensor).await
                }).await
            })
        }).collect::<Vec<_>>();

        for handle in futures::future::join_all(handles).await {
            assert!(handle.unwrap().is_ok());
        }

        assert_eq!(probe.calls(), 8);
        assert_eq!(probe.max_active(), 1);
    }

    #[test]
    fn test_into_inner() {
        let mock = MockResource::new(Duration::ZERO);
        let probe = mock.probe();
        let inner = Exclusive::new(mock).into_inner();
        assert!(Arc::ptr_eq(&probe, &inner.probe()));
    }
}
