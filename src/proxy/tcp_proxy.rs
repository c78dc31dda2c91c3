//! TCP proxy implementation.
//!
//! Provides backend dialing and full-duplex data transfer between client and
//! backend.

use crate::backend::StrategyError;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Size of the relay buffer for each direction.
const BUFFER_SIZE: usize = 16 * 1024;

/// Result of a proxy operation.
#[derive(Debug, Default)]
pub struct ProxyResult {
    /// Bytes sent from client to backend.
    pub bytes_to_backend: u64,
    /// Bytes sent from backend to client.
    pub bytes_to_client: u64,
    /// First I/O error hit by either direction, if any.
    pub error: Option<io::Error>,
}

/// TCP proxy error.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no backend selected: {0}")]
    Selection(#[from] StrategyError),

    #[error("failed to connect to backend {0}: {1}")]
    BackendConnectError(String, io::Error),

    #[error("connection timeout to backend {0}")]
    BackendTimeout(String),

    #[error("forwarding error: {0}")]
    Forwarding(io::Error),
}

/// Connect to a backend server with timeout.
///
/// `addr` is resolved at dial time, so host names are accepted.
#[instrument(skip_all, fields(backend = %addr))]
pub async fn connect_to_backend(
    addr: &str,
    connect_timeout: Duration,
) -> Result<TcpStream, ProxyError> {
    debug!("connecting to backend");

    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            debug!("connected to backend");
            if let Err(e) = stream.set_nodelay(true) {
                warn!(error = %e, "failed to set TCP_NODELAY on backend connection");
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(ProxyError::BackendConnectError(addr.to_string(), e)),
        Err(_) => Err(ProxyError::BackendTimeout(addr.to_string())),
    }
}

/// Proxy data bidirectionally between two streams.
///
/// Both directions run concurrently. When one direction reaches end of
/// stream, the write side of its destination is shut down and the other
/// direction keeps flowing. An I/O error in either direction ends the whole
/// session at once. Returns once both directions have finished, on the first
/// error, or when `session_timeout` elapses; the streams are dropped before
/// returning.
pub async fn proxy_bidirectional<C, B>(
    client: C,
    backend: B,
    session_timeout: Option<Duration>,
) -> ProxyResult
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let mut bytes_to_backend = 0;
    let mut bytes_to_client = 0;

    let outcome = {
        let both = async {
            tokio::try_join!(
                relay(&mut client_read, &mut backend_write, &mut bytes_to_backend),
                relay(&mut backend_read, &mut client_write, &mut bytes_to_client)
            )
            .map(|_| ())
        };

        match session_timeout {
            Some(limit) => timeout(limit, both).await.unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "session timeout elapsed",
                ))
            }),
            None => both.await,
        }
    };

    debug!(bytes_to_backend, bytes_to_client, "proxy completed");

    ProxyResult {
        bytes_to_backend,
        bytes_to_client,
        error: outcome.err(),
    }
}

/// Copy `reader` into `writer` until end of stream, then shut `writer` down.
///
/// Only end of stream half-closes; an error is returned as is.
async fn relay<R, W>(reader: &mut R, writer: &mut W, transferred: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    copy_until_eof(reader, writer, transferred).await?;
    writer.shutdown().await
}

// Counts into `transferred` as it goes, so a failed session still reports
// the bytes relayed before the error.
async fn copy_until_eof<R, W>(reader: &mut R, writer: &mut W, transferred: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        *transferred += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::testing::ResetStream;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_connect_to_backend_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let result = connect_to_backend(&addr, Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_backend_timeout() {
        // Use a non-routable address to trigger timeout
        let result = connect_to_backend("10.255.255.1:12345", Duration::from_millis(100)).await;

        match result {
            Err(ProxyError::BackendTimeout(addr)) => assert_eq!(addr, "10.255.255.1:12345"),
            // Some sandboxes reject or even accept unroutable addresses
            Err(ProxyError::BackendConnectError(_, _)) | Ok(_) => {}
            Err(e) => panic!("expected timeout error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_connect_to_backend_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = connect_to_backend(&addr, Duration::from_secs(5)).await;
        match result.unwrap_err() {
            ProxyError::BackendConnectError(_, _) => {}
            e => panic!("expected connect error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_proxy_relays_both_directions() {
        let (client, mut client_peer) = duplex(64);
        let (backend, mut backend_peer) = duplex(64);

        let proxy = tokio::spawn(proxy_bidirectional(client, backend, None));

        client_peer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend_peer.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(client_peer);
        drop(backend_peer);

        let result = proxy.await.unwrap();
        assert_eq!(result.bytes_to_backend, 4);
        assert_eq!(result.bytes_to_client, 5);
    }

    #[tokio::test]
    async fn test_proxy_half_close_keeps_other_direction() {
        let (client, mut client_peer) = duplex(64);
        let (backend, mut backend_peer) = duplex(64);

        let proxy = tokio::spawn(proxy_bidirectional(client, backend, None));

        // Backend finishes its side first
        backend_peer.write_all(b"bye").await.unwrap();
        backend_peer.shutdown().await.unwrap();

        let mut received = Vec::new();
        client_peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");

        // Client can still send after the backend's half-close
        client_peer.write_all(b"late data").await.unwrap();
        client_peer.shutdown().await.unwrap();

        let mut late = Vec::new();
        backend_peer.read_to_end(&mut late).await.unwrap();
        assert_eq!(late, b"late data");

        let result = proxy.await.unwrap();
        assert!(result.error.is_none());
        assert_eq!(result.bytes_to_backend, 9);
        assert_eq!(result.bytes_to_client, 3);
    }

    #[tokio::test]
    async fn test_proxy_io_error_closes_both_directions() {
        let (backend, mut backend_peer) = duplex(64);

        // The backend stays open and silent while the client resets
        let result = timeout(
            Duration::from_millis(500),
            proxy_bidirectional(ResetStream, backend, None),
        )
        .await
        .expect("session kept running after the client reset");

        let error = result.error.expect("reset should be reported");
        assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(result.bytes_to_backend, 0);

        // The backend side was dropped, so its peer sees end of stream
        let mut rest = Vec::new();
        assert_eq!(backend_peer.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_proxy_session_timeout() {
        let (client, _client_peer) = duplex(64);
        let (backend, _backend_peer) = duplex(64);

        let result = proxy_bidirectional(client, backend, Some(Duration::from_millis(50))).await;

        let error = result.error.expect("idle session should time out");
        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
    }
}
