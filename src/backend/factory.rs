//! Builds the configured strategy from the backend registry.

use crate::backend::algorithms::{
    IpHash, LeastConnections, Random, RoundRobin, Strategy, StrategyError,
    WeightedLeastConnections, WeightedRoundRobin,
};
use crate::backend::BackendRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Backend selection strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum StrategyKind {
    Random,
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    IpHash,
    LeastConnections,
    WeightedLeastConnections,
}

impl StrategyKind {
    /// All selectors, in declaration order.
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Random,
        StrategyKind::RoundRobin,
        StrategyKind::WeightedRoundRobin,
        StrategyKind::IpHash,
        StrategyKind::LeastConnections,
        StrategyKind::WeightedLeastConnections,
    ];

    /// The configuration name of this selector.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::RoundRobin => "round-robin",
            StrategyKind::WeightedRoundRobin => "weighted-round-robin",
            StrategyKind::IpHash => "ip-hash",
            StrategyKind::LeastConnections => "least-connections",
            StrategyKind::WeightedLeastConnections => "weighted-least-connections",
        }
    }

    /// Whether this strategy needs a weight per backend.
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            StrategyKind::WeightedRoundRobin | StrategyKind::WeightedLeastConnections
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StrategyError::UnknownStrategyKind(s.to_string()))
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = StrategyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Build the strategy selected by `kind`.
///
/// # Arguments
///
/// * `kind` - Which algorithm to run
/// * `backends` - The backend registry, shared read-only by the strategy
/// * `weights` - One weight per backend; required by the weighted kinds and
///   ignored by the rest
///
/// # Errors
///
/// [`StrategyError::WeightCountMismatch`] when a weighted kind gets no
/// weights or a list of the wrong length, and
/// [`StrategyError::InvalidWeights`] when the weights cannot be normalized.
/// Nothing is allocated on failure.
pub fn build_strategy(
    kind: StrategyKind,
    backends: BackendRegistry,
    weights: Option<&[f64]>,
) -> Result<Arc<dyn Strategy>, StrategyError> {
    if kind.is_weighted() {
        let count = weights.map_or(0, <[f64]>::len);
        if count != backends.len() {
            return Err(StrategyError::WeightCountMismatch {
                backends: backends.len(),
                weights: count,
            });
        }
    }

    debug!(strategy = %kind, backends = backends.len(), "building strategy");

    let weights = weights.unwrap_or_default();
    let strategy: Arc<dyn Strategy> = match kind {
        StrategyKind::Random => Arc::new(Random::new(backends)),
        StrategyKind::RoundRobin => Arc::new(RoundRobin::new(backends)),
        StrategyKind::WeightedRoundRobin => {
            Arc::new(WeightedRoundRobin::new(backends, weights)?)
        }
        StrategyKind::IpHash => Arc::new(IpHash::new(backends)),
        StrategyKind::LeastConnections => Arc::new(LeastConnections::new(backends)),
        StrategyKind::WeightedLeastConnections => {
            Arc::new(WeightedLeastConnections::new(backends, weights)?)
        }
    };

    Ok(strategy)
}
