//! Weighted round-robin load balancing algorithm.

use super::{Strategy, StrategyError, normalize_weights};
use crate::backend::{BackendRegistry, SelectedBackend};
use parking_lot::Mutex;

/// Scale converting a normalized weight share into consecutive picks.
pub const WEIGHT_FACTOR: f64 = 100.0;

/// Weighted round-robin load balancer.
///
/// Stays on one backend for about `round(share * WEIGHT_FACTOR)` consecutive
/// selections before rotating to the next. With weights `[1, 3]` this gives
/// 25 picks of the first backend followed by 75 of the second. Weighting
/// is coarse-grained: shares are quantized to hundredths and
/// selections are not interleaved. A zero-weight backend is still picked once
/// per rotation.
pub struct WeightedRoundRobin {
    backends: BackendRegistry,
    /// Normalized weights, summing to 1.0.
    weights: Vec<f64>,
    state: Mutex<RotationState>,
}

#[derive(Default)]
struct RotationState {
    cursor: usize,
    selected: u32,
}

impl WeightedRoundRobin {
    /// Create a new weighted round-robin load balancer.
    ///
    /// Weights are normalized here, once.
    pub fn new(backends: BackendRegistry, weights: &[f64]) -> Result<Self, StrategyError> {
        if weights.len() != backends.len() {
            return Err(StrategyError::WeightCountMismatch {
                backends: backends.len(),
                weights: weights.len(),
            });
        }

        let weights = normalize_weights(weights)?;

        Ok(Self {
            backends,
            weights,
            state: Mutex::new(RotationState::default()),
        })
    }

    /// Normalized weights in registry order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Strategy for WeightedRoundRobin {
    fn select_backend(&self, _client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let mut state = self.state.lock();
        let idx = state.cursor;

        state.selected += 1;
        if f64::from(state.selected) >= self.weights[idx] * WEIGHT_FACTOR {
            state.cursor = (idx + 1) % self.backends.len();
            state.selected = 0;
        }

        Ok(self.backends.selected(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picks(wrr: &WeightedRoundRobin, n: usize) -> Vec<usize> {
        (0..n)
            .map(|_| wrr.select_backend("").unwrap().index())
            .collect()
    }

    #[test]
    fn test_weighted_runs_are_consecutive() {
        let wrr = WeightedRoundRobin::new(BackendRegistry::new(["a:1", "b:2"]), &[1.0, 3.0])
            .unwrap();
        assert_eq!(wrr.weights(), &[0.25, 0.75]);

        let run = picks(&wrr, 100);
        assert!(run[..25].iter().all(|i| *i == 0));
        assert!(run[25..].iter().all(|i| *i == 1));

        // Rotation starts over with the first backend
        assert_eq!(wrr.select_backend("").unwrap().index(), 0);
    }

    #[test]
    fn test_weighted_equal_weights() {
        let wrr = WeightedRoundRobin::new(BackendRegistry::new(["a:1", "b:2"]), &[5.0, 5.0])
            .unwrap();

        let run = picks(&wrr, 200);
        assert_eq!(run.iter().filter(|i| **i == 0).count(), 100);
        assert_eq!(run[49], 0);
        assert_eq!(run[50], 1);
    }

    #[test]
    fn test_weighted_zero_weight_picked_once() {
        let wrr = WeightedRoundRobin::new(BackendRegistry::new(["a:1", "b:2"]), &[0.0, 1.0])
            .unwrap();

        let run = picks(&wrr, 102);
        assert_eq!(run[0], 0);
        assert!(run[1..101].iter().all(|i| *i == 1));
        assert_eq!(run[101], 0);
    }

    #[test]
    fn test_weighted_count_mismatch() {
        let result = WeightedRoundRobin::new(BackendRegistry::new(["a:1", "b:2"]), &[1.0]);
        assert!(matches!(
            result,
            Err(StrategyError::WeightCountMismatch {
                backends: 2,
                weights: 1
            })
        ));
    }

    #[test]
    fn test_weighted_empty() {
        let wrr = WeightedRoundRobin::new(BackendRegistry::default(), &[]).unwrap();
        assert_eq!(
            wrr.select_backend(""),
            Err(StrategyError::NoBackendsAvailable)
        );
    }
}
