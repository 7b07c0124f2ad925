//! Worker pool, processing workers and the classifier contract

pub mod classifier;
pub mod pool;
pub mod processing_worker;

pub use classifier::{
    Classification, Classifier, IgnoreReason, ParsedRecord, TransmitClassifier, TransmitRecord,
};
pub use pool::{DrainOutcome, WorkerPool};
pub use processing_worker::{ProcessingWorker, WorkerExit};
