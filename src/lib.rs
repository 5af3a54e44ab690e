//! Bounded-concurrency request dispatcher
//!
//! Core library for admission-gated work dispatch with per-request reply
//! routing and a self-recycling buffer pool.

pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod worker;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use crate::core::gate::{AdmissionGate, Ticket};
pub use crate::core::reply::{PendingReply, ReplyTx};
pub use crate::core::request::{Request, WorkFn, WorkResult};
pub use engine::{DispatchEngine, EngineState};
pub use infrastructure::config::EngineConfig;
pub use infrastructure::metrics::{DispatchMetrics, MetricsSnapshot};
pub use infrastructure::pool::{BufferPool, ObjectPool};

use std::time::Duration;
use thiserror::Error;

/// Main error type for the dispatch engine
///
/// `Clone` because a completed reply is cached inside its `PendingReply`
/// and handed out again on repeated reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Deadline elapsed while waiting for an admission ticket
    #[error("admission wait timed out after {0:?}")]
    AdmissionTimeout(Duration),

    /// The work function returned a failure; delivered through the reply slot
    #[error("work failed: {0}")]
    WorkFailure(String),

    /// The work function panicked; the worker survives, the caller gets this
    #[error("work panicked: {0}")]
    WorkPanicked(String),

    /// Submit called after shutdown began
    #[error("engine closed")]
    EngineClosed,

    /// The engine was torn down before this request's reply was written
    #[error("reply dropped before delivery")]
    ReplyDropped,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DispatchError>;
