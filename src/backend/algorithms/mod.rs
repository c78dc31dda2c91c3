//! Backend selection strategies.

mod ip_hash;
mod least_conn;
mod random;
mod round_robin;
mod weighted;
mod weighted_least_conn;

pub use ip_hash::IpHash;
pub use least_conn::LeastConnections;
pub use random::Random;
pub use round_robin::RoundRobin;
pub use weighted::{WEIGHT_FACTOR, WeightedRoundRobin};
pub use weighted_least_conn::WeightedLeastConnections;

use crate::backend::SelectedBackend;
use thiserror::Error;

/// Errors raised while building or querying a strategy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("no backends available")]
    NoBackendsAvailable,

    #[error("weight count mismatch: {backends} backends but {weights} weights")]
    WeightCountMismatch { backends: usize, weights: usize },

    #[error("unknown strategy kind '{0}'")]
    UnknownStrategyKind(String),

    #[error("invalid weights: {0}")]
    InvalidWeights(String),
}

/// A backend selection algorithm and its private connection accounting.
///
/// One instance is shared by every connection task, so all methods take
/// `&self` and implementations serialize their own state.
pub trait Strategy: Send + Sync {
    /// Select a backend for a client.
    ///
    /// # Arguments
    ///
    /// * `client_addr` - Remote endpoint of the client in `ip:port` form
    ///
    /// # Returns
    ///
    /// A registry member, or [`StrategyError::NoBackendsAvailable`] when
    /// the registry is empty.
    fn select_backend(&self, client_addr: &str) -> Result<SelectedBackend, StrategyError>;

    /// Notify that a forwarding session against `backend` has begun.
    fn on_connected(&self, _backend: &SelectedBackend) {}

    /// Notify that a forwarding session against `backend` has ended.
    fn on_disconnected(&self, _backend: &SelectedBackend) {}

    /// Notify that `backend` was selected but could not be dialed.
    ///
    /// Releases anything reserved by [`select_backend`](Self::select_backend).
    /// This is not paired with `on_connected`/`on_disconnected`.
    fn on_dial_failed(&self, _backend: &SelectedBackend) {}

    /// Live connections currently accounted against `backend`.
    fn connection_count(&self, _backend: &SelectedBackend) -> u32 {
        0
    }

    /// Live connections per backend, in registry order.
    ///
    /// Empty for strategies that do not track connections.
    fn snapshot(&self) -> Vec<u32> {
        Vec::new()
    }
}

/// Normalize weights so they sum to 1.0.
///
/// Rejects negative or non-finite entries and an all-zero vector.
pub(crate) fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>, StrategyError> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(StrategyError::InvalidWeights(format!(
            "weight {w} is not a non-negative finite number"
        )));
    }

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(StrategyError::InvalidWeights(
            "weights sum to zero".to_string(),
        ));
    }

    Ok(weights.iter().map(|w| w / sum).collect())
}

/// Decrement a live counter without going below zero.
pub(crate) fn release(counter: &mut u32) {
    *counter = counter.saturating_sub(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_weights() {
        let normalized = normalize_weights(&[1.0, 3.0]).unwrap();
        assert_eq!(normalized, vec![0.25, 0.75]);

        let normalized = normalize_weights(&[2.0, 2.0, 4.0]).unwrap();
        assert!((normalized.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_rejects_bad_weights() {
        assert!(matches!(
            normalize_weights(&[1.0, -1.0]),
            Err(StrategyError::InvalidWeights(_))
        ));
        assert!(matches!(
            normalize_weights(&[0.0, 0.0]),
            Err(StrategyError::InvalidWeights(_))
        ));
        assert!(matches!(
            normalize_weights(&[f64::NAN]),
            Err(StrategyError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut counter = 1;
        release(&mut counter);
        release(&mut counter);
        assert_eq!(counter, 0);
    }
}
