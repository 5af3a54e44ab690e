//! Worker pool
//!
//! A fixed set of long-lived tasks pulls requests from the shared channel,
//! acquires an admission ticket, runs the work function, and delivers the
//! reply. Concurrency is bounded twice over: structurally by the worker
//! count, and by the admission gate's permit count.
//!
//! A single failing unit of work never costs more than its own reply: the
//! work function runs under catch_unwind, the ticket is an RAII guard, and
//! the failure is delivered through the reply slot like any other result.

use crate::core::gate::AdmissionGate;
use crate::core::request::Request;
use crate::infrastructure::metrics::DispatchMetrics;
use crate::DispatchError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Shared request source: one receiver, many workers
pub(crate) type RequestSource<T, R> = Arc<Mutex<mpsc::UnboundedReceiver<Request<T, R>>>>;

/// Spawn `worker_count` workers draining the shared source
///
/// Each request captured by a worker is moved into that worker's scope;
/// nothing per-request is shared between workers. Workers exit once the
/// channel is closed and fully drained.
pub(crate) fn spawn_workers<T, R>(
    worker_count: usize,
    source: RequestSource<T, R>,
    gate: Arc<AdmissionGate>,
    metrics: Arc<DispatchMetrics>,
) -> Vec<JoinHandle<()>>
where
    T: Send + 'static,
    R: Send + 'static,
{
    (0..worker_count)
        .map(|worker_id| {
            let source = Arc::clone(&source);
            let gate = Arc::clone(&gate);
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move {
                tracing::debug!(worker_id, "worker started");
                worker_loop(worker_id, source, gate, metrics).await;
                tracing::debug!(worker_id, "worker exited");
            })
        })
        .collect()
}

async fn worker_loop<T, R>(
    worker_id: usize,
    source: RequestSource<T, R>,
    gate: Arc<AdmissionGate>,
    metrics: Arc<DispatchMetrics>,
) where
    T: Send + 'static,
    R: Send + 'static,
{
    loop {
        // Hold the receiver lock only for the dequeue itself; the next
        // worker can wait for the following request while this one runs.
        let request = { source.lock().await.recv().await };
        let Some(request) = request else {
            break; // channel closed and drained
        };

        let ticket = gate.acquire().await;
        metrics.record_work_started();

        let Request {
            payload,
            work,
            reply,
        } = request;

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || work(payload)));

        // Ticket released before the reply is written, whatever happened.
        drop(ticket);

        let result = match outcome {
            Ok(Ok(value)) => {
                metrics.record_reply_ok();
                Ok(value)
            }
            Ok(Err(message)) => {
                metrics.record_reply_failed(false);
                Err(DispatchError::WorkFailure(message))
            }
            Err(panic_payload) => {
                metrics.record_reply_failed(true);
                let message = panic_message(panic_payload);
                tracing::warn!(worker_id, %message, "work function panicked");
                Err(DispatchError::WorkPanicked(message))
            }
        };

        reply.deliver(result);
    }
}

/// Best-effort text from a panic payload
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
