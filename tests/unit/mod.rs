pub mod common;
// Partition consumers, consumer manager, backpressure
pub mod kafka;
// Lifecycle controller, shutdown ordering, signals
pub mod server;
// Classifier rules and worker pool behaviour
pub mod worker;
