//! Service lifecycle: controller and signal handling

pub mod controller;
pub mod shutdown;

pub use controller::{connect_store, LifecycleState, PipelineController};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownSignal, SignalListener};
