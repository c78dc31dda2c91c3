//! Per-connection forwarding lifecycle.
//!
//! A client connection moves through
//! `Accepted → BackendSelected → Dialing → Forwarding → Closed`, leaving
//! early on failure. The strategy sees exactly one `on_connected` and one
//! `on_disconnected` for every successful dial, and `on_dial_failed` for every
//! selection whose dial did not succeed.

use crate::backend::{SelectedBackend, Strategy, StrategyError};
use crate::config::TcpConfig;
use crate::metrics::MetricsCollector;
use crate::proxy::{ProxyError, ProxyResult, connect_to_backend, proxy_bidirectional};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, instrument};

/// Outcome of a forwarding session that ran to completion.
#[derive(Debug)]
pub struct SessionSummary {
    /// The backend the session was forwarded to.
    pub backend: SelectedBackend,
    /// Bytes sent from client to backend.
    pub bytes_to_backend: u64,
    /// Bytes sent from backend to client.
    pub bytes_to_client: u64,
    /// Time spent forwarding.
    pub duration: Duration,
}

/// Runs client connections against a shared strategy.
#[derive(Clone)]
pub struct Forwarder {
    strategy: Arc<dyn Strategy>,
    metrics: MetricsCollector,
    connect_timeout: Duration,
    session_timeout: Option<Duration>,
}

impl Forwarder {
    /// Create a forwarder for `strategy`.
    pub fn new(strategy: Arc<dyn Strategy>, metrics: MetricsCollector, tcp: &TcpConfig) -> Self {
        Self {
            strategy,
            metrics,
            connect_timeout: tcp.connect_timeout,
            session_timeout: tcp.session_timeout,
        }
    }

    /// The strategy shared by every connection.
    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Pick a backend for a client.
    ///
    /// The selection may reserve a connection slot, so it must be followed by
    /// a dial and the matching notifications. [`run_connection`] does this.
    ///
    /// [`run_connection`]: Self::run_connection
    pub fn select_backend(&self, client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        self.strategy.select_backend(client_addr)
    }

    /// Run one client connection to completion.
    ///
    /// Both sockets are closed before this returns. Errors only concern this
    /// connection; nothing is retried.
    #[instrument(skip_all, fields(conn_id = %conn_id, client = %client_addr))]
    pub async fn run_connection<C>(
        &self,
        client: C,
        client_addr: &str,
        conn_id: &str,
    ) -> Result<SessionSummary, ProxyError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let backend = match self.select_backend(client_addr) {
            Ok(backend) => backend,
            Err(e) => {
                self.metrics.selection_failed();
                return Err(e.into());
            }
        };

        debug!(backend = %backend, "selected backend server");

        let mut session = SessionGuard::dialing(
            Arc::clone(&self.strategy),
            self.metrics.clone(),
            backend.clone(),
        );

        let backend_stream = connect_to_backend(backend.address(), self.connect_timeout).await?;

        session.connected();
        info!(backend = %backend, "forwarding session started");

        let start = Instant::now();
        let result = proxy_bidirectional(client, backend_stream, self.session_timeout).await;
        let duration = start.elapsed();

        session.record(&result);
        // Sockets are closed; this issues the disconnect
        drop(session);

        info!(
            backend = %backend,
            bytes_to_backend = result.bytes_to_backend,
            bytes_to_client = result.bytes_to_client,
            duration_ms = duration.as_millis(),
            "forwarding session closed"
        );

        match result.error {
            Some(e) => Err(ProxyError::Forwarding(e)),
            None => Ok(SessionSummary {
                backend,
                bytes_to_backend: result.bytes_to_backend,
                bytes_to_client: result.bytes_to_client,
                duration,
            }),
        }
    }
}

/// Strategy and metrics bookkeeping for one selected backend.
///
/// Dropping the guard settles the accounting for whatever state the session
/// reached, including when the connection future is cancelled: a dial that
/// never completed releases the selection, an open session is disconnected.
struct SessionGuard {
    strategy: Arc<dyn Strategy>,
    metrics: MetricsCollector,
    backend: SelectedBackend,
    state: SessionState,
}

enum SessionState {
    Dialing,
    Forwarding {
        started: Instant,
        bytes_to_backend: u64,
        bytes_to_client: u64,
    },
}

impl SessionGuard {
    fn dialing(strategy: Arc<dyn Strategy>, metrics: MetricsCollector, backend: SelectedBackend) -> Self {
        Self {
            strategy,
            metrics,
            backend,
            state: SessionState::Dialing,
        }
    }

    /// Mark the dial as successful. Must be called at most once.
    fn connected(&mut self) {
        debug_assert!(matches!(self.state, SessionState::Dialing));

        self.strategy.on_connected(&self.backend);
        self.metrics.session_opened(self.backend.address());
        self.state = SessionState::Forwarding {
            started: Instant::now(),
            bytes_to_backend: 0,
            bytes_to_client: 0,
        };
    }

    fn record(&mut self, result: &ProxyResult) {
        if let SessionState::Forwarding {
            bytes_to_backend,
            bytes_to_client,
            ..
        } = &mut self.state
        {
            *bytes_to_backend = result.bytes_to_backend;
            *bytes_to_client = result.bytes_to_client;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match self.state {
            SessionState::Dialing => {
                self.strategy.on_dial_failed(&self.backend);
                self.metrics.dial_failed(self.backend.address());
            }
            SessionState::Forwarding {
                started,
                bytes_to_backend,
                bytes_to_client,
            } => {
                self.strategy.on_disconnected(&self.backend);
                self.metrics.session_closed(
                    self.backend.address(),
                    bytes_to_backend,
                    bytes_to_client,
                    started.elapsed(),
                );
            }
        }
    }
}
