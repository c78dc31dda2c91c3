//! Connection forwarding: backend dialing, byte relaying, and the session
//! lifecycle that keeps the strategy's accounting in step.

mod forwarder;
mod tcp_proxy;

#[cfg(test)]
pub(crate) mod testing;

pub use forwarder::{Forwarder, SessionSummary};
pub use tcp_proxy::{ProxyError, ProxyResult, connect_to_backend, proxy_bidirectional};
