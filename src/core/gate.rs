//! Admission gate for bounding concurrent work execution
//!
//! Caps the number of in-flight work-function invocations at a fixed limit
//! regardless of arrival rate. Waiters are queued FIFO by the underlying
//! semaphore, so no waiter starves as long as tickets keep being released.

use crate::{DispatchError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One unit of admission capacity
///
/// RAII guard: dropping the ticket releases its permit and wakes one waiter.
/// Release is tied to drop, so a ticket cannot be released twice and is
/// released even when the holder unwinds.
pub struct Ticket {
    _permit: OwnedSemaphorePermit,
    held: Arc<AtomicU64>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.held.fetch_sub(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket").finish_non_exhaustive()
    }
}

/// Concurrency limiter handing out at most `max_outstanding` tickets
///
/// # Example
/// ```
/// use workq::AdmissionGate;
///
/// # tokio_test::block_on(async {
/// let gate = AdmissionGate::new(2).unwrap();
/// let a = gate.acquire().await;
/// let b = gate.acquire().await;
/// assert!(gate.try_acquire().is_none()); // saturated
/// drop(a);
/// assert!(gate.try_acquire().is_some());
/// # });
/// ```
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    held: Arc<AtomicU64>,
    max_outstanding: usize,
}

impl AdmissionGate {
    /// Create a gate with the given concurrency limit
    ///
    /// # Errors
    /// Returns `DispatchError::Config` if `max_outstanding` is zero.
    pub fn new(max_outstanding: usize) -> Result<Self> {
        if max_outstanding == 0 {
            return Err(DispatchError::Config(
                "max_outstanding must be > 0".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_outstanding)),
            held: Arc::new(AtomicU64::new(0)),
            max_outstanding,
        })
    }

    /// Acquire a ticket, suspending until capacity is available
    pub async fn acquire(&self) -> Ticket {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("admission semaphore closed");
        self.issue(permit)
    }

    /// Acquire a ticket with a deadline
    ///
    /// # Errors
    /// Returns `DispatchError::AdmissionTimeout` if the deadline elapses
    /// while waiting; no permit is consumed in that case.
    pub async fn acquire_timeout(&self, deadline: Duration) -> Result<Ticket> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(deadline, acquire).await {
            Ok(permit) => Ok(self.issue(permit.expect("admission semaphore closed"))),
            Err(_) => Err(DispatchError::AdmissionTimeout(deadline)),
        }
    }

    /// Non-blocking acquire for select-style callers
    pub fn try_acquire(&self) -> Option<Ticket> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.issue(permit))
    }

    /// Number of tickets currently outstanding
    ///
    /// Never exceeds `max_outstanding`.
    #[inline]
    pub fn held(&self) -> u64 {
        self.held.load(Ordering::Relaxed)
    }

    /// Configured concurrency limit
    #[inline]
    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    fn issue(&self, permit: OwnedSemaphorePermit) -> Ticket {
        self.held.fetch_add(1, Ordering::Relaxed);
        Ticket {
            _permit: permit,
            held: Arc::clone(&self.held),
        }
    }
}
