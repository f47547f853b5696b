//! Observability and Metrics
//!
//! Counters for attachments, modifications and snapshots, kept in atomics so any
//! thread (including the owning thread) can record without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for inspector operations
#[derive(Debug)]
pub struct Metrics {
    /// Attachments read off a connection
    pub attachments_received: AtomicU64,
    /// Attachments refused before dispatch (version, allow-list, malformed)
    pub attachments_rejected: AtomicU64,
    /// Modifications that reached their setter and succeeded
    pub modifications_applied: AtomicU64,
    /// Modifications refused for any reason other than a stale target
    pub modifications_rejected: AtomicU64,
    /// Modifications aimed at destroyed or unknown objects
    pub stale_targets: AtomicU64,
    /// Snapshots delivered to their requester
    pub snapshots_delivered: AtomicU64,
    /// Snapshot requests overtaken by a newer one
    pub snapshots_superseded: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            attachments_received: AtomicU64::new(0),
            attachments_rejected: AtomicU64::new(0),
            modifications_applied: AtomicU64::new(0),
            modifications_rejected: AtomicU64::new(0),
            stale_targets: AtomicU64::new(0),
            snapshots_delivered: AtomicU64::new(0),
            snapshots_superseded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn attachment_received(&self) {
        self.attachments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attachment_rejected(&self) {
        self.attachments_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn modification_applied(&self) {
        self.modifications_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn modification_rejected(&self) {
        self.modifications_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_target(&self) {
        self.stale_targets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_delivered(&self) {
        self.snapshots_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_superseded(&self) {
        self.snapshots_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attachments_received: self.attachments_received.load(Ordering::Relaxed),
            attachments_rejected: self.attachments_rejected.load(Ordering::Relaxed),
            modifications_applied: self.modifications_applied.load(Ordering::Relaxed),
            modifications_rejected: self.modifications_rejected.load(Ordering::Relaxed),
            stale_targets: self.stale_targets.load(Ordering::Relaxed),
            snapshots_delivered: self.snapshots_delivered.load(Ordering::Relaxed),
            snapshots_superseded: self.snapshots_superseded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            attachments_received = snapshot.attachments_received,
            attachments_rejected = snapshot.attachments_rejected,
            modifications_applied = snapshot.modifications_applied,
            modifications_rejected = snapshot.modifications_rejected,
            stale_targets = snapshot.stale_targets,
            snapshots_delivered = snapshot.snapshots_delivered,
            snapshots_superseded = snapshot.snapshots_superseded,
            uptime_seconds = snapshot.uptime_seconds,
            "Inspector metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub attachments_received: u64,
    pub attachments_rejected: u64,
    pub modifications_applied: u64,
    pub modifications_rejected: u64,
    pub stale_targets: u64,
    pub snapshots_delivered: u64,
    pub snapshots_superseded: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Logs how long an operation took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
