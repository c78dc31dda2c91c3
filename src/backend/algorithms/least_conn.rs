//! Least-connections load balancing algorithm.

use super::{Strategy, StrategyError, release};
use crate::backend::{BackendRegistry, SelectedBackend};
use parking_lot::Mutex;

/// Least-connections load balancer.
///
/// Sends connections to the backend with the fewest live connections.
/// Breaks ties by registry order. The counter is incremented when the backend
/// is selected rather than when the session opens, so concurrent selections
/// never see the same stale minimum.
pub struct LeastConnections {
    backends: BackendRegistry,
    /// Live connection count per backend, indexed like the registry.
    connections: Mutex<Vec<u32>>,
}

impl LeastConnections {
    /// Create a new least-connections load balancer.
    pub fn new(backends: BackendRegistry) -> Self {
        let connections = Mutex::new(vec![0; backends.len()]);
        Self {
            backends,
            connections,
        }
    }
}

impl Strategy for LeastConnections {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let mut connections = self.connections.lock();

        // Find backend with minimum connections, first one wins ties
        let mut selected = 0;
        for (idx, count) in connections.iter().enumerate() {
            if *count < connections[selected] {
                selected = idx;
            }
        }

        connections[selected] += 1;
        Ok(self.backends.selected(selected))
    }

    fn on_disconnected(&self, backend: &SelectedBackend) {
        if let Some(counter) = self.connections.lock().get_mut(backend.index()) {
            release(counter);
        }
    }

    fn on_dial_failed(&self, backend: &SelectedBackend) {
        self.on_disconnected(backend);
    }

    fn connection_count(&self, backend: &SelectedBackend) -> u32 {
        self.connections
            .lock()
            .get(backend.index())
            .copied()
            .unwrap_or(0)
    }

    fn snapshot(&self) -> Vec<u32> {
        self.connections.lock().clone()
    }
}
