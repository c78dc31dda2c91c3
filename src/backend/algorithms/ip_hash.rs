//! IP hash load balancing algorithm.

use super::{Strategy, StrategyError};
use crate::backend::{BackendRegistry, SelectedBackend};

/// IP hash load balancer.
///
/// Consistently routes connections from the same client IP to the same
/// backend. The hash is the sum of the bytes of the textual IP, which keeps
/// routing compatible with existing deployments but distributes poorly:
/// addresses whose byte sums collide modulo the backend count cluster on one
/// backend.
pub struct IpHash {
    backends: BackendRegistry,
}

impl IpHash {
    /// Create a new IP hash load balancer.
    pub fn new(backends: BackendRegistry) -> Self {
        Self { backends }
    }
}

/// Strip a trailing `:port` from a client address.
fn client_ip(client_addr: &str) -> &str {
    client_addr
        .rsplit_once(':')
        .map_or(client_addr, |(ip, _port)| ip)
}

/// Sum of the byte values of `ip`.
pub(crate) fn ip_hash(ip: &str) -> u64 {
    ip.bytes().map(u64::from).sum()
}

impl Strategy for IpHash {
    fn select_backend(&self, client_addr: &str) -> Result<SelectedBackend, StrategyError> {
        if self.backends.is_empty() {
            return Err(StrategyError::NoBackendsAvailable);
        }

        let hash = ip_hash(client_ip(client_addr));
        let idx = (hash % self.backends.len() as u64) as usize;

        Ok(self.backends.selected(idx))
    }
}
