//! Graceful shutdown handling for the dispatcher.
//!
//! Handles SIGTERM/SIGINT and tells every subscriber to stop taking new work.
//! Work already started is left to finish by its owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownSignal {
    /// SIGTERM signal received
    Sigterm,
    /// SIGINT signal received (Ctrl+C)
    Sigint,
    /// Programmatic shutdown requested
    Programmatic,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sigterm => write!(f, "SIGTERM"),
            Self::Sigint => write!(f, "SIGINT"),
            Self::Programmatic => write!(f, "PROGRAMMATIC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// No new batches are polled; in-flight evaluations are finishing
    Draining,
    /// Every subscriber reported done
    Complete,
}

/// Coordinates shutdown between the signal handler, the dispatcher and the
/// HTTP server.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    phase: RwLock<ShutdownPhase>,
    shutdown_initiated: AtomicBool,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            phase: RwLock::new(ShutdownPhase::Running),
            shutdown_initiated: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.phase.read().await
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }

    /// Start draining. Duplicate signals are ignored.
    pub async fn initiate_shutdown(&self, signal: ShutdownSignal) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Shutdown already in progress, ignoring duplicate signal");
            return;
        }

        info!(signal = %signal, "Initiating graceful shutdown");
        *self.phase.write().await = ShutdownPhase::Draining;

        info!(
            subscribers = self.shutdown_tx.receiver_count(),
            "Broadcasting shutdown signal to subscribers"
        );
        if let Err(e) = self.shutdown_tx.send(signal) {
            debug!("No active subscribers for shutdown signal: {}", e);
        }
    }

    pub async fn mark_complete(&self) {
        *self.phase.write().await = ShutdownPhase::Complete;
        info!("Graceful shutdown complete");
    }

    /// Resolve once shutdown has been initiated, including before this call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown_initiated() {
            return;
        }
        // A closed or lagged channel still means a signal went out.
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Install OS signal handlers (SIGTERM, SIGINT)
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) -> tokio::task::JoinHandle<()> {
    info!("Installing OS signal handlers");

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };

            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGINT handler");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    coordinator.initiate_shutdown(ShutdownSignal::Sigterm).await;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    coordinator.initiate_shutdown(ShutdownSignal::Sigint).await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            // Windows doesn't have SIGTERM, only SIGINT (Ctrl+C)
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }

            info!("Received Ctrl+C");
            coordinator.initiate_shutdown(ShutdownSignal::Sigint).await;
        }
    })
}
