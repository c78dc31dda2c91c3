//! Weighted least-connections load balancing algorithm.

use super::{Strategy, StrategyError, normalize_weights, release};
use crate::backend::{BackendRegistry, SelectedBackend};
use parking_lot::Mutex;

/// Guards the ratio computation against division by zero.
const EPSILON: f64 = 1e-6;

/// Weighted least-connections load balancer.
///
/// Picks the backend whose weight is largest relative to its share of the
/// live connections:
///
/// ```text
/// ratio[i] = weight[i] / (live[i] / (total + ε) + ε)
/// ```
///
/// The highest ratio wins and ties keep the lowest index. As with
/// [`LeastConnections`](super::LeastConnections) the counter is incremented
/// at selection time. The read of the total and the increment happen under
/// the same lock.
pub struct WeightedLeastConnections {
    backends: BackendRegistry,
    /// Normalized weights, summing to 1.0.
    weights: Vec<f64>,
    connections: Mutex<Vec<u32>>,
}

impl WeightedLeastConnections {
    /// Create a new weighted least-connections load balancer.
    pub fn new(backends: BackendRegistry, weights: &[f64]) -> Result<Self, StrategyError> {
        if weights.len() != backends.len() {
            return Err(StrategyError::WeightCountMismatch {
                backends: backends.len(),
                weights: weights.len(),
            });
        }

        let weights = normalize_weights(weights)?;
        let connections = Mutex::new(vec![0; backends.len()]);

        Ok(Self {
            backends,
            weights,
            connections,
        })
    }

    /// Normalized weights in registry order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Strategy for WeightedLeastConnections {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let mut connections = self.connections.lock();
        let total: f64 = connections.iter().map(|c| f64::from(*c)).sum();

        let mut selected = 0;
        let mut max_ratio = f64::NEG_INFINITY;
        for (idx, (count, weight)) in connections.iter().zip(&self.weights).enumerate() {
            let live_fraction = f64::from(*count) / (total + EPSILON);
            let ratio = weight / (live_fraction + EPSILON);
            if ratio > max_ratio {
                max_ratio = ratio;
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
