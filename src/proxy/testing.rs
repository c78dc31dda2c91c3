//! Test doubles for the forwarding lifecycle.

use crate::backend::{BackendRegistry, SelectedBackend, Strategy, StrategyError};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Always selects the first backend and counts every notification.
pub(crate) struct RecordingStrategy {
    backends: BackendRegistry,
    counts: Mutex<(usize, usize, usize)>,
}

impl RecordingStrategy {
    pub(crate) fn new<I: IntoIterator<Item = String>>(backends: I) -> Self {
        Self {
            backends: BackendRegistry::new(backends),
            counts: Mutex::new((0, 0, 0)),
        }
    }

    /// `(connected, disconnected, dial_failed)` notification counts.
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        *self.counts.lock()
    }
}

impl Strategy for RecordingStrategy {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }
        Ok(self.backends.selected(0))
    }

    fn on_connected(&self, _backend: &SelectedBackend) {
        self.counts.lock().0 += 1;
    }

    fn on_disconnected(&self, _backend: &SelectedBackend) {
        self.counts.lock().1 += 1;
    }

    fn on_dial_failed(&self, _backend: &SelectedBackend) {
        self.counts.lock().2 += 1;
    }
}

/// A peer whose reads fail with `ConnectionReset` and whose writes vanish.
pub(crate) struct ResetStream;

impl AsyncRead for ResetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
    }
}

impl AsyncWrite for ResetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
