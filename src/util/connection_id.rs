//! Connection identifiers for log correlation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing connection ids.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-local identifier attached to every log line of one client session.
///
/// Format: `conn-{counter}` with the counter zero-padded to 16 hex digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate the next connection id.
    pub fn next() -> Self {
        let count = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn-{:016x}", count))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_connection_id_format() {
        let id = ConnectionId::next();
        assert!(id.as_str().starts_with("conn-"));
        assert_eq!(id.as_str().len(), "conn-".len() + 16);
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_connection_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(ConnectionId::next()), "duplicate ID generated");
        }
    }
}
