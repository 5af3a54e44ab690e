//! Dispatch engine
//!
//! Composes the admission gate, worker pool, buffer pool, and per-request
//! reply routing into one service core. Callers submit a payload plus a work
//! function and get back a handle owning exactly one eventual reply;
//! completion order is independent of submission order.

use crate::core::gate::AdmissionGate;
use crate::core::reply::PendingReply;
use crate::core::request::{Request, WorkResult};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::metrics::DispatchMetrics;
use crate::infrastructure::pool::BufferPool;
use crate::worker::spawn_workers;
use crate::{DispatchError, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Engine lifecycle states
///
/// `Running` → (shutdown) → `Draining` → (workers exited) → `Closed`.
/// Submit is only valid in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting submissions
    Running,
    /// Shutdown begun: no new submissions, backlog still being worked
    Draining,
    /// All workers exited
    Closed,
}

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Bounded-concurrency request dispatcher
///
/// # Example
/// ```
/// use workq::{DispatchEngine, EngineConfig};
///
/// # tokio_test::block_on(async {
/// let config = EngineConfig { max_outstanding: 2, worker_count: 2, ..Default::default() };
/// let engine: DispatchEngine<u32, u32> = DispatchEngine::new(config).unwrap();
///
/// let pending = engine.submit(21, |n| Ok(n * 2)).unwrap();
/// assert_eq!(pending.recv().await, Ok(42));
///
/// engine.shutdown().await;
/// # });
/// ```
#[derive(Debug)]
pub struct DispatchEngine<T, R> {
    /// Present while Running; taken on shutdown to close the channel
    sender: parking_lot::Mutex<Option<mpsc::UnboundedSender<Request<T, R>>>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    state: AtomicU8,
    closed: Notify,
    gate: Arc<AdmissionGate>,
    buffers: Arc<BufferPool>,
    metrics: Arc<DispatchMetrics>,
}

impl<T, R> DispatchEngine<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Build the engine and spawn its workers
    ///
    /// # Errors
    /// Returns `DispatchError::Config` if the configuration fails
    /// validation (zero `max_outstanding` or `worker_count`).
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let gate = Arc::new(AdmissionGate::new(config.max_outstanding)?);
        let buffers = Arc::new(BufferPool::with_buffer_size(
            config.buffer_pool_capacity,
            config.buffer_size,
        ));
        let metrics = Arc::new(DispatchMetrics::new());

        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = spawn_workers(
            config.worker_count,
            source,
            Arc::clone(&gate),
            Arc::clone(&metrics),
        );

        tracing::info!(
            worker_count = config.worker_count,
            max_outstanding = config.max_outstanding,
            buffer_pool_capacity = config.buffer_pool_capacity,
            "dispatch engine started"
        );

        Ok(Self {
            sender: parking_lot::Mutex::new(Some(tx)),
            workers: parking_lot::Mutex::new(workers),
            state: AtomicU8::new(STATE_RUNNING),
            closed: Notify::new(),
            gate,
            buffers,
            metrics,
        })
    }

    /// Submit a unit of work
    ///
    /// Non-blocking: the request is enqueued and a handle to its eventual
    /// reply is returned. The admission gate, not the queue, bounds how many
    /// work functions execute at once.
    ///
    /// # Errors
    /// Returns `DispatchError::EngineClosed` once shutdown has begun; the
    /// request is not enqueued in that case.
    pub fn submit<F>(&self, payload: T, work: F) -> Result<PendingReply<R>>
    where
        F: FnOnce(T) -> WorkResult<R> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            self.metrics.record_rejected_closed();
            return Err(DispatchError::EngineClosed);
        };

        let (request, pending) = Request::new(payload, work);
        tx.send(request).map_err(|_| DispatchError::EngineClosed)?;
        self.metrics.record_submitted();
        Ok(pending)
    }

    /// Drain and stop the engine
    ///
    /// Closes the request source, waits for the workers to finish the
    /// backlog and exit, then marks the engine `Closed`. Every request
    /// accepted before shutdown still receives its reply. Idempotent:
    /// concurrent callers all return once the engine is closed.
    pub async fn shutdown(&self) {
        let won = self
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if won {
            tracing::info!("dispatch engine draining");
            self.sender.lock().take(); // closes the channel

            let handles = std::mem::take(&mut *self.workers.lock());
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!("worker task failed to join: {e}");
                }
            }

            self.state.store(STATE_CLOSED, Ordering::Release);
            self.closed.notify_waiters();
            tracing::info!("dispatch engine closed");
            return;
        }

        // Another caller is driving the drain; wait for it to finish.
        loop {
            let notified = self.closed.notified();
            if self.state.load(Ordering::Acquire) == STATE_CLOSED {
                return;
            }
            notified.await;
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => EngineState::Running,
            STATE_DRAINING => EngineState::Draining,
            _ => EngineState::Closed,
        }
    }

    /// Byte-buffer pool shared by callers and workers
    ///
    /// Independent of the submit path: borrow and return buffers around
    /// request/response payloads as needed.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffers
    }

    /// Engine metrics
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// The admission gate (for held-ticket observability)
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn engine_with(max_outstanding: usize, worker_count: usize) -> DispatchEngine<u64, u64> {
        DispatchEngine::new(EngineConfig {
            max_outstanding,
            worker_count,
            buffer_pool_capacity: 8,
            buffer_size: 64,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let err = DispatchEngine::<u64, u64>::new(EngineConfig {
            max_outstanding: 0,
            ..EngineConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)));
    }

    #[tokio::test]
    async fn test_submit_and_reply() {
        let engine = engine_with(2, 2);
        let pending = engine.submit(20, |n| Ok(n + 2)).unwrap();
        assert_eq!(pending.recv().await, Ok(22));
        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrency_never_exceeds_max_outstanding() {
        crate::test_utils::init_test_logging();
        let engine = engine_with(2, 8);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut pendings = Vec::new();
        for _ in 0..7 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let pending = engine
                .submit(0, move |n| {
                    let now = running.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    peak.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(40));
                    running.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(n)
                })
                .unwrap();
            pendings.push(pending);
        }

        for pending in &pendings {
            pending.recv().await.unwrap();
        }

        // Gate admits at most 2 work functions at a time
        assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);
        assert_eq!(engine.metrics().snapshot().in_flight_peak, 2);
        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replies_arrive_out_of_submission_order() {
        let engine = engine_with(4, 4);

        // First-submitted request is the slowest
        let slow = engine
            .submit(1, |n| {
                std::thread::sleep(Duration::from_millis(60));
                Ok(n)
            })
            .unwrap();
        let fast = engine.submit(2, Ok).unwrap();

        // The fast caller is not blocked behind the slow one
        let fast_value = tokio::time::timeout(Duration::from_millis(50), fast.recv())
            .await
            .unwrap();
        assert_eq!(fast_value, Ok(2));
        assert_eq!(slow.recv().await, Ok(1));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_reply_read_is_idempotent_without_rerunning_work() {
        let engine = engine_with(2, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = {
            let calls = Arc::clone(&calls);
            engine
                .submit(5, move |n| {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(n * 3)
                })
                .unwrap()
        };

        assert_eq!(pending.recv().await, Ok(15));
        assert_eq!(pending.recv().await, Ok(15));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_drains_all_pending_requests() {
        crate::test_utils::init_test_logging();
        let engine = engine_with(4, 4);

        let mut pendings = Vec::new();
        for i in 0..100u64 {
            pendings.push(engine.submit(i, |n| Ok(n)).unwrap());
        }

        engine.shutdown().await;
        assert_eq!(engine.state(), EngineState::Closed);
        assert_eq!(engine.gate().held(), 0);

        // Closed only after every accepted request got its reply
        assert_eq!(engine.metrics().snapshot().replies_ok, 100);
        for (i, pending) in pendings.iter().enumerate() {
            assert_eq!(pending.recv().await, Ok(i as u64));
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails_fast() {
        let engine = engine_with(2, 2);
        engine.shutdown().await;

        assert_eq!(engine.state(), EngineState::Closed);
        let err = engine.submit(1, Ok).unwrap_err();
        assert_eq!(err, DispatchError::EngineClosed);
        assert_eq!(engine.metrics().snapshot().rejected_closed, 1);
        assert_eq!(engine.metrics().snapshot().submitted, 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let engine = Arc::new(engine_with(2, 2));

        let concurrent = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.shutdown().await })
        };
        engine.shutdown().await;
        concurrent.await.unwrap();

        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_two_permits_serialize_five_sleeps() {
        let engine = engine_with(2, 4);
        let started = Instant::now();

        let pendings: Vec<_> = [3u64, 5, 7, 9, 11]
            .into_iter()
            .map(|n| {
                engine
                    .submit(n, |n| {
                        std::thread::sleep(Duration::from_millis(50));
                        Ok(n * 2)
                    })
                    .unwrap()
            })
            .collect();

        let mut replies = Vec::new();
        for pending in &pendings {
            replies.push(pending.recv().await.unwrap());
        }
        let elapsed = started.elapsed();

        assert_eq!(replies, vec![6, 10, 14, 18, 22]);
        // 5 sleeps of 50ms with 2 running at a time: at least 3 batches,
        // at most the serial worst case (with scheduling slack)
        assert!(elapsed >= Duration::from_millis(140), "too fast: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(450), "too slow: {elapsed:?}");
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_work_failure_reaches_caller_as_reply() {
        let engine = engine_with(2, 2);
        let pending = engine
            .submit(0, |_| -> WorkResult<u64> { Err("bad input".into()) })
            .unwrap();
        assert_eq!(
            pending.recv().await,
            Err(DispatchError::WorkFailure("bad input".into()))
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_buffer_pool_accessor_round_trip() {
        let engine = engine_with(2, 2);

        let mut buf = engine.buffer_pool().acquire();
        buf.extend_from_slice(b"payload");
        engine.buffer_pool().release_cleared(buf);

        let buf = engine.buffer_pool().acquire();
        assert!(buf.is_empty());
        assert_eq!(engine.buffer_pool().hits(), 1);
        engine.shutdown().await;
    }
}
