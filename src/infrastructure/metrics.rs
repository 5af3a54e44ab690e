//! Metrics collection for the dispatch engine
//!
//! Lock-free counters using atomic operations. Updated from workers and the
//! submit path, exported as snapshots by callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Engine metrics collector
///
/// Thread-safe counters updated from the submit path and workers.
/// Snapshots taken for export.
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Requests accepted by submit
    submitted: AtomicU64,
    /// Replies delivered with a success value
    replies_ok: AtomicU64,
    /// Replies delivered with a work failure
    replies_failed: AtomicU64,
    /// Work functions that panicked (counted in replies_failed too)
    work_panics: AtomicU64,
    /// Submits rejected because shutdown had begun
    rejected_closed: AtomicU64,
    /// Work functions executing right now
    in_flight: AtomicU64,
    /// High-water mark of in_flight
    in_flight_peak: AtomicU64,
    /// Start time for uptime calculation
    started_at: Instant,
}

/// Metrics snapshot for export
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub replies_ok: u64,
    pub replies_failed: u64,
    pub work_panics: u64,
    pub rejected_closed: u64,
    pub in_flight: u64,
    pub in_flight_peak: u64,
    pub uptime_seconds: u64,
}

impl DispatchMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            replies_ok: AtomicU64::new(0),
            replies_failed: AtomicU64::new(0),
            work_panics: AtomicU64::new(0),
            rejected_closed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            in_flight_peak: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record an accepted submission
    #[inline]
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submit rejected by shutdown
    #[inline]
    pub fn record_rejected_closed(&self) {
        self.rejected_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a work function starting execution
    #[inline]
    pub fn record_work_started(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.in_flight_peak.fetch_max(now, Ordering::Relaxed);
    }

    /// Record a successful reply
    #[inline]
    pub fn record_reply_ok(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.replies_ok.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed reply; `panicked` marks the abnormal-termination path
    #[inline]
    pub fn record_reply_failed(&self, panicked: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.replies_failed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.work_panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            replies_ok: self.replies_ok.load(Ordering::Relaxed),
            replies_failed: self.replies_failed.load(Ordering::Relaxed),
            work_panics: self.work_panics.load(Ordering::Relaxed),
            rejected_closed: self.rejected_closed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            in_flight_peak: self.in_flight_peak.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = DispatchMetrics::new();
        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_work_started();
        metrics.record_reply_ok();
        metrics.record_work_started();
        metrics.record_reply_failed(true);

        let snap = metrics.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.replies_ok, 1);
        assert_eq!(snap.replies_failed, 1);
        assert_eq!(snap.work_panics, 1);
        assert_eq!(snap.in_flight, 0);
    }

    #[test]
    fn test_in_flight_peak_tracks_high_water_mark() {
        let metrics = DispatchMetrics::new();
        metrics.record_work_started();
        metrics.record_work_started();
        metrics.record_work_started();
        metrics.record_reply_ok();
        metrics.record_work_started();

        let snap = metrics.snapshot();
        assert_eq!(snap.in_flight, 3);
        assert_eq!(snap.in_flight_peak, 3);
    }
}
