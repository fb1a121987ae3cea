// Build metrics module
//
// Lightweight counters for builds and engine events

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Build metrics
///
/// Uses atomic operations so the relay task and the front end can both touch
/// the counters without locks. Logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Builds accepted by the orchestrator
    pub builds_started: AtomicUsize,

    /// Builds that reached `build::finished`
    pub builds_finished: AtomicUsize,

    /// Builds that ended in the failed state
    pub builds_failed: AtomicUsize,

    /// Builds rejected because another was running
    pub builds_rejected: AtomicUsize,

    /// Total time of finished builds in milliseconds
    pub total_build_time_ms: AtomicU64,

    /// Engine events that produced a log line
    pub events_processed: AtomicU64,

    /// Engine events that were unknown, malformed or silent
    pub events_ignored: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            builds_started: AtomicUsize::new(0),
            builds_finished: AtomicUsize::new(0),
            builds_failed: AtomicUsize::new(0),
            builds_rejected: AtomicUsize::new(0),
            total_build_time_ms: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_build_started(&self) {
        self.builds_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished build and, if known, how long it took
    pub fn record_build_finished(&self, duration: Option<Duration>) {
        self.builds_finished.fetch_add(1, Ordering::Relaxed);
        if let Some(duration) = duration {
            self.total_build_time_ms
                .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        }
    }

    pub fn record_build_failed(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build_rejected(&self) {
        self.builds_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per finished build in milliseconds
    pub fn avg_build_time_ms(&self) -> f64 {
        let total = self.total_build_time_ms.load(Ordering::Relaxed);
        let count = self.builds_finished.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Build Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Builds: {} started, {} finished, {} failed, {} rejected",
            self.builds_started.load(Ordering::Relaxed),
            self.builds_finished.load(Ordering::Relaxed),
            self.builds_failed.load(Ordering::Relaxed),
            self.builds_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total build time: {:.2}s (avg: {:.2}ms per build)",
            self.total_build_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_build_time_ms()
        );
        tracing::info!(
            "Engine events: {} processed, {} ignored",
            self.events_processed.load(Ordering::Relaxed),
            self.events_ignored.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
