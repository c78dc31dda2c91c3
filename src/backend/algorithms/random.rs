//! Random load balancing algorithm.

use super::{Strategy, StrategyError};
use crate::backend::{BackendRegistry, SelectedBackend};
use rand::Rng;

/// Random load balancer.
///
/// Picks a backend uniformly at random for every connection.
pub struct Random {
    backends: BackendRegistry,
}

impl Random {
    /// Create a new random load balancer.
    pub fn new(backends: BackendRegistry) -> Self {
        Self { backends }
    }
}

impl Strategy for Random {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let idx = rand::thread_rng().gen_range(0..self.backends.len());
        Ok(self.backends.selected(idx))
    }
}
