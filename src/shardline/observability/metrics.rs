//! Pipeline counters
//!
//! Tracks consumption, classification and store outcomes with atomic
//! counters. There is no exporter; the controller logs a summary when it
//! stops.
//!
//! ## Usage
//!
//! ```rust
//! use shardline::shardline::observability::{PipelineMetrics, PipelineObserver};
//!
//! let metrics = PipelineMetrics::new();
//! metrics.on_consumed();
//! metrics.on_accept("42_transmit_new");
//! metrics.on_store_success("42_transmit_new");
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.accepted, 1);
//! println!("{}", snapshot.format_summary());
//! ```

use super::PipelineObserver;
use crate::shardline::error::{ClassifyError, StoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PipelineMetrics {
    started_at: Instant,

    // Source side
    consumed: AtomicU64,
    consume_errors: AtomicU64,

    // Classification
    accepted: AtomicU64,
    ignored: AtomicU64,
    invalid: AtomicU64,

    // Store writes
    store_success: AtomicU64,
    store_fail: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            consumed: AtomicU64::new(0),
            consume_errors: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            store_success: AtomicU64::new(0),
            store_fail: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average records consumed per second since creation
    pub fn consumed_per_sec(&self) -> u64 {
        let secs = self.uptime().as_secs();
        if secs == 0 {
            return 0;
        }
        self.consumed.load(Ordering::Relaxed) / secs
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            uptime: self.uptime(),
            consumed: self.consumed.load(Ordering::Relaxed),
            consumed_per_sec: self.consumed_per_sec(),
            consume_errors: self.consume_errors.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            store_success: self.store_success.load(Ordering::Relaxed),
            store_fail: self.store_fail.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for PipelineMetrics {
    fn on_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_consume_error(&self) {
        self.consume_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_accept(&self, _key: &str) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn on_ignore(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    fn on_invalid(&self, _err: &ClassifyError) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    fn on_store_success(&self, _key: &str) {
        self.store_success.fetch_add(1, Ordering::Relaxed);
    }

    fn on_store_fail(&self, _key: &str, _err: &StoreError) {
        self.store_fail.fetch_add(1, Ordering::Relaxed);
    }
}

/// Immutable snapshot of pipeline counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMetricsSnapshot {
    pub uptime: Duration,
    pub consumed: u64,
    pub consumed_per_sec: u64,
    pub consume_errors: u64,
    pub accepted: u64,
    pub ignored: u64,
    pub invalid: u64,
    pub store_success: u64,
    pub store_fail: u64,
}

impl PipelineMetricsSnapshot {
    /// Messages that reached a classification outcome
    pub fn classified(&self) -> u64 {
        self.accepted + self.ignored + self.invalid
    }

    /// Format metrics for human-readable logging
    pub fn format_summary(&self) -> String {
        format!(
            "Pipeline: {} consumed ({} rec/sec, {} errors), {} accepted, {} ignored, {} invalid, store {} ok / {} failed, uptime {:.1}s",
            self.consumed,
            self.consumed_per_sec,
            self.consume_errors,
            self.accepted,
            self.ignored,
            self.invalid,
            self.store_success,
            self.store_fail,
            self.uptime.as_secs_f64()
        )
    }
}
