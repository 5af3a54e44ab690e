//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical support code:
//! - Configuration management
//! - Metrics counters
//! - Buffer pooling

pub mod config;
pub mod metrics;
pub mod pool;

pub use config::EngineConfig;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pool::{BufferPool, ObjectPool};
