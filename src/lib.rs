//! # shardline
//!
//! Kafka ingestion into a sharded key-value store.
//!
//! Partition consumers read a consumer group's topics and forward each record
//! into a bounded shared queue. A pool of workers classifies the records and
//! writes the accepted ones through a hash router onto a fixed set of Redis
//! shards. The process stops on SIGTERM/SIGINT: consumers first, then the
//! workers drain the queue, then the store closes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shardline::{PipelineConfig, PipelineController, ShutdownCoordinator, SignalListener};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_file("shardline.yaml")?;
//!     let mut controller = PipelineController::new(config);
//!     controller.init().await?;
//!     controller.start()?;
//!
//!     let coordinator = ShutdownCoordinator::new();
//!     let signals = coordinator.subscribe();
//!     let listener = SignalListener::install()?;
//!     tokio::spawn(async move { coordinator.forward_os_signals(listener).await });
//!
//!     let report = controller.serve(signals).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

#![allow(clippy::derivable_impls)]
#![allow(clippy::new_without_default)]

pub mod shardline;

// Re-export main API at crate root for easy access
pub use shardline::{
    config::{PipelineConfig, StoreConfig},
    error::{ConfigError, PipelineError, PipelineResult, StoreError, StoreResult},
    kafka::InboundMessage,
    observability::{PipelineMetrics, PipelineObserver},
    server::{PipelineController, ShutdownCoordinator, ShutdownReport, ShutdownSignal, SignalListener},
    store::{HashStrategy, RecordStore, StoreRouter},
    worker::{Classification, Classifier, TransmitClassifier},
};
