//! tcplb - A TCP load balancer with pluggable backend selection strategies
//!
//! This crate provides:
//! - Six selection strategies: random, round-robin, weighted round-robin,
//!   IP hash, least connections, and weighted least connections
//! - Transparent full-duplex TCP forwarding with exact per-backend
//!   connection accounting
//! - YAML configuration
//! - Prometheus metrics

pub mod backend;
pub mod config;
pub mod frontend;
pub mod metrics;
pub mod proxy;
pub mod util;

pub use config::Config;
