//! Graceful shutdown handling.

use tokio::sync::broadcast;
use tracing::{error, info};

/// Fans a single shutdown event out to every long-running task.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal manager.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown.
    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }

    /// Wait for SIGINT (or SIGTERM on unix), then trigger shutdown.
    ///
    /// A handler that cannot be installed is logged and never fires.
    pub async fn shutdown_on_signal(&self) {
        wait_for_signal().await;
        self.shutdown();
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    after_ctrl_c(tokio::signal::ctrl_c().await).await;
}

/// Resolve once Ctrl+C was received; pend forever if listening failed.
async fn after_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
