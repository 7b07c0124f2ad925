//! Signal handling and shutdown reporting
//!
//! | Signal | Trigger | Action |
//! |--------|---------|--------|
//! | SIGINT | Ctrl+C | Graceful stop |
//! | SIGTERM | kill, Kubernetes, Docker | Graceful stop |
//! | SIGHUP | Terminal hangup | Reload (no-op), keep serving |
//!
//! OS signals are relayed through a [`ShutdownCoordinator`] so tests can
//! trigger the same paths without sending real signals.

use crate::shardline::error::StoreError;
use crate::shardline::worker::DrainOutcome;
use log::{info, warn};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

/// Lifecycle signal received by the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT - User interrupt (Ctrl+C)
    Interrupt,
    /// SIGTERM - Termination request (kill, Kubernetes, Docker)
    Terminate,
    /// SIGHUP - Reload request
    Hangup,
}

impl ShutdownSignal {
    /// Whether this signal ends the serve loop
    pub fn is_stop(&self) -> bool {
        !matches!(self, ShutdownSignal::Hangup)
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Installed OS signal handlers, read repeatedly
#[cfg(unix)]
pub struct SignalListener {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next SIGTERM, SIGINT or SIGHUP
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM - initiating graceful shutdown");
                ShutdownSignal::Terminate
            }
            _ = self.sigint.recv() => {
                info!("Received SIGINT (Ctrl+C) - initiating graceful shutdown");
                ShutdownSignal::Interrupt
            }
            _ = self.sighup.recv() => {
                info!("Received SIGHUP - reload requested");
                ShutdownSignal::Hangup
            }
        }
    }
}

/// Ctrl+C only on non-unix targets
#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler failed: {}", e);
        }
        info!("Received Ctrl+C - initiating graceful shutdown");
        ShutdownSignal::Interrupt
    }
}

/// Broadcasts lifecycle signals to every subscriber
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }

    pub fn trigger(&self, signal: ShutdownSignal) {
        if let Err(e) = self.sender.send(signal) {
            warn!("No shutdown listeners registered: {:?}", e);
        }
    }

    /// Relay OS signals until a stop signal has been relayed
    pub async fn forward_os_signals(&self, mut listener: SignalListener) {
        loop {
            let signal = listener.recv().await;
            self.trigger(signal);
            if signal.is_stop() {
                break;
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened during a controller stop
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// The signal that triggered the stop, if any
    pub signal: Option<ShutdownSignal>,
    pub consumers_stopped: usize,
    pub workers: DrainOutcome,
    /// Aggregated store close failures; never blocks the other steps
    pub store_close_error: Option<StoreError>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Every worker drained the queue and the store closed cleanly
    pub fn all_graceful(&self) -> bool {
        !self.workers.forced && self.workers.failed == 0 && self.store_close_error.is_none()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_graceful() {
            write!(
                f,
                "Graceful shutdown complete: {} consumers stopped, {} workers drained in {:?}",
                self.consumers_stopped, self.workers.drained, self.elapsed
            )
        } else {
            write!(
                f,
                "Shutdown complete: {} consumers stopped, {} workers drained, {} force-stopped, {} failed in {:?}",
                self.consumers_stopped,
                self.workers.drained,
                self.workers.stopped,
                self.workers.failed,
                self.elapsed
            )?;
            if let Some(e) = &self.store_close_error {
                write!(f, "; {}", e)?;
            }
            Ok(())
        }
    }
}
