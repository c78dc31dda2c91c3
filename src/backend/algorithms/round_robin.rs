//! Round-robin load balancing algorithm.

use super::{Strategy, StrategyError};
use crate::backend::{BackendRegistry, SelectedBackend};
use parking_lot::Mutex;

/// Round-robin load balancer.
///
/// Distributes connections evenly across all backends in registry order,
/// starting from the first one.
pub struct RoundRobin {
    backends: BackendRegistry,
    cursor: Mutex<usize>,
}

impl RoundRobin {
    /// Create a new round-robin load balancer.
    pub fn new(backends: BackendRegistry) -> Self {
        Self {
            backends,
            cursor: Mutex::new(0),
        }
    }
}

impl Strategy for RoundRobin {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let mut cursor = self.cursor.lock();
        let idx = *cursor;
        *cursor = (idx + 1) % self.backends.len();

        Ok(self.backends.selected(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backends() -> BackendRegistry {
        BackendRegistry::new(["127.0.0.1:8001", "127.0.0.1:8002", "127.0.0.1:8003"])
    }

    #[test]
    fn test_round_robin_cycles() {
        let rr = RoundRobin::new(test_backends());

        let s1 = rr.select_backend("").unwrap();
        let s2 = rr.select_backend("").unwrap();
        let s3 = rr.select_backend("").unwrap();
        let s4 = rr.select_backend("").unwrap();

        assert_eq!(s1.address(), "127.0.0.1:8001");
        assert_eq!(s2.address(), "127.0.0.1:8002");
        assert_eq!(s3.address(), "127.0.0.1:8003");
        assert_eq!(s4, s1); // Cycles back
    }

    #[test]
    fn test_round_robin_ignores_client() {
        let rr = RoundRobin::new(test_backends());

        assert_eq!(rr.select_backend("10.0.0.1:1").unwrap().index(), 0);
        assert_eq!(rr.select_backend("10.0.0.1:1").unwrap().index(), 1);
    }

    #[test]
    fn test_round_robin_empty() {
        let rr = RoundRobin::new(BackendRegistry::default());
        assert_eq!(
            rr.select_backend(""),
            Err(StrategyError::NoBackendsAvailable)
        );
    }
}
