//! Observability context passed to consumers and workers
//!
//! The controller constructs one observer at init and hands it to every
//! task. Aggregation and transport live behind the trait.

pub mod metrics;

pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};

use crate::shardline::error::{ClassifyError, StoreError};

/// Per-message pipeline events
pub trait PipelineObserver: Send + Sync {
    /// A record was forwarded into the work queue
    fn on_consumed(&self) {}

    /// The source reported an error
    fn on_consume_error(&self) {}

    fn on_accept(&self, key: &str);

    fn on_ignore(&self);

    fn on_invalid(&self, err: &ClassifyError);

    fn on_store_success(&self, key: &str);

    fn on_store_fail(&self, key: &str, err: &StoreError);
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_accept(&self, _key: &str) {}

    fn on_ignore(&self) {}

    fn on_invalid(&self, _err: &ClassifyError) {}

    fn on_store_success(&self, _key: &str) {}

    fn on_store_fail(&self, _key: &str, _err: &StoreError) {}
}
