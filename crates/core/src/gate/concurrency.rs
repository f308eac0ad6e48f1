//! Counting gate backed by a FIFO semaphore.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::metrics;

use super::error::GateError;

struct GateInner {
    name: String,
    capacity: usize,
    in_use: AtomicUsize,
    waiting: AtomicUsize,
}

impl GateInner {
    fn publish(&self) {
        metrics::GATE_IN_USE
            .with_label_values(&[&self.name])
            .set(self.in_use.load(Ordering::SeqCst) as i64);
        metrics::GATE_WAITING
            .with_label_values(&[&self.name])
            .set(self.waiting.load(Ordering::SeqCst) as i64);
    }
}

/// A named counting admission token.
///
/// `in_use` never exceeds `capacity`: every increment happens while holding a
/// semaphore permit and every decrement happens before that permit is
/// returned.
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
    semaphore: Arc<Semaphore>,
    acquire_timeout: Option<Duration>,
}

/// Snapshot of a gate's usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub name: String,
    pub capacity: usize,
    pub in_use: usize,
    pub waiting: usize,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `capacity` holders.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, GateError> {
        let name = name.into();
        if capacity == 0 {
            return Err(GateError::InvalidCapacity { gate: name });
        }
        let inner = Arc::new(GateInner {
            name,
            capacity,
            in_use: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        });
        inner.publish();
        Ok(Self {
            inner,
            semaphore: Arc::new(Semaphore::new(capacity)),
            acquire_timeout: None,
        })
    }

    /// Bounds how long [`acquire`](Self::acquire) waits.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            name: self.inner.name.clone(),
            capacity: self.inner.capacity,
            in_use: self.in_use(),
            waiting: self.inner.waiting.load(Ordering::SeqCst),
        }
    }

    /// Suspends until a slot is free, then takes it.
    ///
    /// The slot is released when the returned token is dropped or passed to
    /// [`release`](Self::release).
    pub async fn acquire(&self) -> Result<GateToken, GateError> {
        let waiter = WaitGuard::new(Arc::clone(&self.inner));
        let acquire = Arc::clone(&self.semaphore).acquire_owned();

        let permit = match self.acquire_timeout {
            Some(limit) => match tokio::time::timeout(limit, acquire).await {
                Ok(permit) => permit,
                Err(_) => {
                    return Err(GateError::Timeout {
                        gate: self.inner.name.clone(),
                        waited_secs: limit.as_secs(),
                    })
                }
            },
            None => acquire.await,
        }
        .map_err(|_| GateError::Closed {
            gate: self.inner.name.clone(),
        })?;
        drop(waiter);

        let in_use = self.inner.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        debug_assert!(in_use <= self.inner.capacity);
        self.inner.publish();
        debug!(gate = %self.inner.name, in_use, capacity = self.inner.capacity, "Gate acquired");

        Ok(GateToken {
            inner: Arc::clone(&self.inner),
            permit: Some(permit),
        })
    }

    /// Returns a slot, admitting the longest waiter if any.
    pub fn release(&self, token: GateToken) {
        drop(token);
    }

    /// Closes the gate; pending and future acquisitions fail with `Closed`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Counts a pending acquisition, including one abandoned by cancellation.
struct WaitGuard {
    inner: Arc<GateInner>,
}

impl WaitGuard {
    fn new(inner: Arc<GateInner>) -> Self {
        inner.waiting.fetch_add(1, Ordering::SeqCst);
        inner.publish();
        Self { inner }
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.inner.waiting.fetch_sub(1, Ordering::SeqCst);
        self.inner.publish();
    }
}

/// A held gate slot.
#[must_use = "dropping the token releases the gate immediately"]
pub struct GateToken {
    inner: Arc<GateInner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl GateToken {
    pub fn gate_name(&self) -> &str {
        &self.inner.name
    }
}

impl Drop for GateToken {
    fn drop(&mut self) {
        // Decrement before the permit goes back so the next holder never
        // observes in_use == capacity + 1.
        self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
        self.inner.publish();
        debug!(gate = %self.inner.name, "Gate released");
        drop(self.permit.take());
    }
}

impl std::fmt::Debug for GateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateToken")
            .field("gate", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        assert!(matches!(
            ConcurrencyGate::new("zero", 0),
            Err(GateError::InvalidCapacity { .. })
        ));
    }

    #[tokio::test]
    async fn test_acquire_and_release_counts() {
        let gate = ConcurrencyGate::new("count", 2).unwrap();
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        assert_eq!(gate.in_use(), 2);
        gate.release(a);
        assert_eq!(gate.in_use(), 1);
        drop(b);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn test_waiter_pends_until_release() {
        let gate = ConcurrencyGate::new("pending", 1).unwrap();
        let held = gate.acquire().await.unwrap();

        let mut waiter = tokio_test::task::spawn(gate.acquire());
        tokio_test::assert_pending!(waiter.poll());
        assert_eq!(gate.status().waiting, 1);

        drop(held);
        assert!(waiter.is_woken());
        let token = tokio_test::assert_ready_ok!(waiter.poll());
        assert_eq!(gate.in_use(), 1);
        assert_eq!(gate.status().waiting, 0);
        drop(token);
    }

    #[tokio::test]
    async fn test_full_gate_times_out() {
        let gate = ConcurrencyGate::new("bounded", 1)
            .unwrap()
            .with_acquire_timeout(Some(Duration::from_millis(50)));
        let _held = gate.acquire().await.unwrap();
        let err = gate.acquire().await.unwrap_err();
        assert!(matches!(err, GateError::Timeout { .. }));
        assert_eq!(gate.status().waiting, 0);
        assert_eq!(gate.in_use(), 1);
    }

    #[tokio::test]
    async fn test_waiters_admitted_in_fifo_order() {
        let gate = Arc::new(ConcurrencyGate::new("fifo", 1).unwrap());
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = gate.acquire().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let waiter_gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let token = waiter_gate.acquire().await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(token);
            }));
            // Let each waiter enqueue before the next one.
            while gate.status().waiting < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_not_counted() {
        let gate = ConcurrencyGate::new("cancel", 1).unwrap();
        let _held = gate.acquire().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(pending.is_err());
        assert_eq!(gate.status().waiting, 0);
    }

    #[tokio::test]
    async fn test_closed_gate_fails_acquire() {
        let gate = ConcurrencyGate::new("closed", 1).unwrap();
        gate.close();
        assert!(matches!(gate.acquire().await, Err(GateError::Closed { .. })));
    }
}
