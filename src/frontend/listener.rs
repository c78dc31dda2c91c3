//! Frontend listener implementation.
//!
//! Accepts incoming connections and hands each one to the forwarder in its
//! own task.

use crate::proxy::{Forwarder, ProxyError};
use crate::util::ConnectionId;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Pause after an accept error that is not tied to a single connection,
/// such as running out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Listener errors that end the accept loop.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("listener failed: {0}")]
    Fatal(io::Error),
}

/// Frontend listener that accepts and handles connections.
pub struct FrontendListener {
    listener: TcpListener,
    forwarder: Forwarder,
}

impl FrontendListener {
    /// Bind a new frontend listener.
    pub async fn bind(address: SocketAddr, forwarder: Forwarder) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;

        info!(listen = %listener.local_addr()?, "frontend listener bound");

        Ok(Self::from_listener(listener, forwarder))
    }

    /// Wrap an already-bound listener.
    pub fn from_listener(listener: TcpListener, forwarder: Forwarder) -> Self {
        Self {
            listener,
            forwarder,
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    ///
    /// Transient accept errors are logged and the loop continues. Connections
    /// already handed off keep running after this returns.
    #[instrument(skip_all, fields(listen = ?self.listener.local_addr().ok()))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        info!("frontend listener starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) if is_fatal_accept_error(&e) => {
                            error!(error = %e, "listener failed");
                            return Err(ListenerError::Fatal(e));
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            if !is_connection_error(&e) {
                                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            }
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("frontend listener shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Handle an incoming connection.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let forwarder = self.forwarder.clone();
        let conn_id = ConnectionId::next();

        tokio::spawn(async move {
            let client = client_addr.to_string();

            match forwarder.run_connection(stream, &client, conn_id.as_str()).await {
                Ok(summary) => {
                    debug!(
                        conn_id = %conn_id,
                        client = %client,
                        backend = %summary.backend,
                        "connection completed"
                    );
                }
                Err(ProxyError::Forwarding(e)) => {
                    debug!(
                        conn_id = %conn_id,
                        client = %client,
                        error = %e,
                        "connection ended with I/O error"
                    );
                }
                Err(e) => {
                    warn!(
                        conn_id = %conn_id,
                        client = %client,
                        error = %e,
                        "connection handling failed"
                    );
                }
            }
        });
    }
}

/// Errors reported by `accept` for one pending connection.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Errors meaning the listening socket itself is unusable.
fn is_fatal_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput
            | io::ErrorKind::NotConnected
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::Unsupported
    )
}
