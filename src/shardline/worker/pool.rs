//! Worker pool
//!
//! Owns a fixed set of processing workers, each with its own stop signal.
//! Normal shutdown closes the queue and lets the workers drain it; the stop
//! signal is the forced path.

use super::classifier::Classifier;
use super::processing_worker::{ProcessingWorker, WorkerExit};
use crate::shardline::config::WorkerConfig;
use crate::shardline::error::{PipelineError, PipelineResult};
use crate::shardline::observability::PipelineObserver;
use crate::shardline::queue::WorkQueueReceiver;
use crate::shardline::store::RecordStore;
use futures::future::join_all;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct WorkerHandle {
    id: usize,
    stop: watch::Sender<bool>,
    task: JoinHandle<WorkerExit>,
}

/// How the pool finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Workers that exited after draining the closed queue
    pub drained: usize,
    /// Workers that exited on their stop signal
    pub stopped: usize,
    /// Workers whose task panicked or was aborted
    pub failed: usize,
    /// The drain deadline expired and stop signals were sent
    pub forced: bool,
}

pub struct WorkerPool {
    config: WorkerConfig,
    pending: Vec<(ProcessingWorker, watch::Sender<bool>)>,
    running: Vec<WorkerHandle>,
    started: bool,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            running: Vec::new(),
            started: false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    /// Workers whose loop has not finished yet
    pub fn active_workers(&self) -> usize {
        self.running.iter().filter(|h| !h.task.is_finished()).count()
    }

    /// Build `routines` workers reading from `queue`
    pub fn init(
        &mut self,
        queue: WorkQueueReceiver,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn RecordStore>,
        observer: Arc<dyn PipelineObserver>,
    ) {
        for id in 0..self.config.routines {
            let (stop_tx, stop_rx) = watch::channel(false);
            let worker = ProcessingWorker::new(
                id,
                queue.clone(),
                stop_rx,
                classifier.clone(),
                store.clone(),
                observer.clone(),
            );
            self.pending.push((worker, stop_tx));
        }
        info!("WorkerPool initialized {} worker(s)", self.pending.len());
    }

    pub fn start(&mut self) -> PipelineResult<()> {
        if self.started {
            return Err(PipelineError::lifecycle("worker pool already started"));
        }
        if self.pending.is_empty() {
            return Err(PipelineError::lifecycle("worker pool has no workers, call init first"));
        }
        self.started = true;
        for (worker, stop) in self.pending.drain(..) {
            let id = worker.id();
            let task = tokio::spawn(worker.run());
            self.running.push(WorkerHandle { id, stop, task });
        }
        info!("WorkerPool started {} worker(s)", self.running.len());
        Ok(())
    }

    /// Send every worker its stop signal. Workers finish the message in hand.
    pub fn stop(&self) {
        for handle in &self.running {
            let _ = handle.stop.send(true);
        }
    }

    /// Wait for every worker to finish. With a deadline, workers still
    /// running when it expires are stopped and then awaited.
    pub async fn drain(&mut self, deadline: Option<Duration>) -> DrainOutcome {
        self.pending.clear();
        let mut outcome = DrainOutcome::default();

        let mut ids = Vec::with_capacity(self.running.len());
        let mut stops = Vec::with_capacity(self.running.len());
        let mut tasks = Vec::with_capacity(self.running.len());
        for handle in self.running.drain(..) {
            ids.push(handle.id);
            stops.push(handle.stop);
            tasks.push(handle.task);
        }

        let joined = join_all(tasks);
        tokio::pin!(joined);
        let results = match deadline {
            Some(deadline) => tokio::select! {
                results = &mut joined => results,
                _ = tokio::time::sleep(deadline) => {
                    warn!("WorkerPool: drain deadline {:?} expired, stopping workers", deadline);
                    outcome.forced = true;
                    for stop in &stops {
                        let _ = stop.send(true);
                    }
                    joined.await
                }
            },
            None => joined.await,
        };

        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(WorkerExit::QueueClosed) => outcome.drained += 1,
                Ok(WorkerExit::Stopped) => outcome.stopped += 1,
                Err(e) => {
                    error!("WorkerPool: worker {} task failed: {}", id, e);
                    outcome.failed += 1;
                }
            }
        }
        info!(
            "WorkerPool finished: {} drained, {} stopped, {} failed",
            outcome.drained, outcome.stopped, outcome.failed
        );
        outcome
    }
}
