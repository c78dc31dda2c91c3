//! Backend registry, selection strategies, and the strategy factory.

pub mod algorithms;
mod factory;
mod registry;

pub use algorithms::{Strategy, StrategyError};
pub use factory::{StrategyKind, build_strategy};
pub use registry::{BackendAddress, BackendRegistry, SelectedBackend};
