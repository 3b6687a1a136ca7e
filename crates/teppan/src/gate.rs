//! Admission control.
//!
//! [`AdmissionGate`] bounds how many requests may be in flight, meaning
//! queued for the exclusive resource or computing on it. The
//! [`InflightCounter`] tracks exactly those permit holders so health
//! reporting can read the current backlog without touching the gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use crate::error::AdmissionError;

/// Lock-free count of requests currently holding an admission permit.
#[derive(Debug, Default)]
pub struct InflightCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of permit holders. Eventually consistent with
    /// concurrent acquisitions and releases.
    pub fn get(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Highest value ever observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    fn increment(&self) -> usize {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        now
    }

    fn decrement(&self) -> usize {
        self.current.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

/// # AdmissionGate
///
/// A counting permit pool of fixed capacity.
///
/// Waiters are served in FIFO order. Without a timeout, [`acquire`](Self::acquire)
/// only fails once the gate has been [closed](Self::close); under sustained
/// overload a waiter simply keeps waiting.
pub struct AdmissionGate {
    permits: Semaphore,
    capacity: usize,
    inflight: InflightCounter,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` permits.
    ///
    /// Callers are expected to have validated `capacity >= 1`; see
    /// [`DispatchConfig::validate`](crate::config::DispatchConfig::validate).
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Semaphore::new(capacity),
            capacity,
            inflight: InflightCounter::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn inflight(&self) -> &InflightCounter {
        &self.inflight
    }

    /// Waits for a permit.
    ///
    /// # Parameters
    ///
    /// * `timeout` - Give up after this long; `None` waits indefinitely
    ///
    /// # Returns
    ///
    /// The held permit, which knows how long the caller waited for it
    ///
    /// # Errors
    ///
    /// [`AdmissionError::TimedOut`] when `timeout` expired first,
    /// [`AdmissionError::Closed`] when the gate was closed before or during the wait
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<AdmissionPermit<'_>, AdmissionError> {
        let start = Instant::now();
        let permit = match timeout {
            None => self.permits.acquire().await.map_err(|_| AdmissionError::Closed)?,
            Some(limit) => match tokio::time::timeout(limit, self.permits.acquire()).await {
                Ok(acquired) => acquired.map_err(|_| AdmissionError::Closed)?,
                Err(_) => return Err(AdmissionError::TimedOut { waited: start.elapsed() }),
            },
        };
        let waited = start.elapsed();
        self.inflight.increment();

        Ok(AdmissionPermit {
            permit: Some(permit),
            inflight: &self.inflight,
            waited,
        })
    }

    /// Stops admitting. Pending and future `acquire` calls fail with
    /// [`AdmissionError::Closed`]; permits already held stay valid.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// A held admission permit.
///
/// Dropping the permit releases it and decrements the inflight counter, so a
/// dispatch that is abandoned mid-flight never leaks capacity.
/// [`release`](Self::release) does the same but also reports the backlog left
/// behind.
pub struct AdmissionPermit<'a> {
    permit: Option<SemaphorePermit<'a>>,
    inflight: &'a InflightCounter,
    waited: Duration,
}

impl AdmissionPermit<'_> {
    /// Time spent waiting for this permit.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Decrements the inflight counter, then returns the permit to the pool.
    ///
    /// # Returns
    ///
    /// The inflight count right after this request left it
    pub fn release(mut self) -> usize {
        let remaining = self.inflight.decrement();
        drop(self.permit.take());
        remaining
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        if self.permit.take().is_some() {
            self.inflight.decrement();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_acquire_and_release_track_inflight() {
        let gate = AdmissionGate::new(2);

        let first = gate.acquire(None).await.unwrap();
        let second = gate.acquire(None).await.unwrap();
        assert_eq!(gate.inflight().get(), 2);
        assert_eq!(gate.inflight().peak(), 2);

        assert_eq!(first.release(), 1);
        drop(second);
        assert_eq!(gate.inflight().get(), 0);
        assert_eq!(gate.inflight().peak(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocks_until_release() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(None).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let permit = gate.acquire(None).await.unwrap();
                permit.waited()
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        assert_eq!(gate.inflight().get(), 1);

        drop(held);
        let waited = waiter.await.unwrap();
        assert!(waited >= Duration::from_millis(30));
        assert_eq!(gate.inflight().get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire(None).await.unwrap();

        let err = gate.acquire(Some(Duration::from_millis(50))).await.err().unwrap();
        match err {
            AdmissionError::TimedOut { waited } => assert!(waited >= Duration::from_millis(50)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gate.inflight().get(), 1);
    }

    #[tokio::test]
    async fn test_timeout_not_hit_when_permit_free() {
        let gate = AdmissionGate::new(1);
        let permit = gate.acquire(Some(Duration::from_millis(1))).await.unwrap();
        assert_eq!(permit.release(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_wakes_waiters() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire(None).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire(None).await.err() })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        gate.close();
        assert!(gate.is_closed());
        assert_eq!(waiter.await.unwrap(), Some(AdmissionError::Closed));

        // the permit held before closing is still released normally
        assert_eq!(held.release(), 0);
        assert_eq!(gate.acquire(None).await.err(), Some(AdmissionError::Closed));
    }
}
