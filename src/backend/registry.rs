//! The ordered, immutable set of backend servers.

use std::fmt;

/// A dialable backend address in `host:port` form.
pub type BackendAddress = String;

/// Ordered list of backend addresses supplied at startup.
///
/// Duplicate entries are legal; they bias selection toward that backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendRegistry {
    addresses: Vec<BackendAddress>,
}

impl BackendRegistry {
    /// Create a registry from an ordered list of addresses.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<BackendAddress>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether the registry has no backends.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// All addresses in registry order.
    pub fn addresses(&self) -> &[BackendAddress] {
        &self.addresses
    }

    /// Build the selection result for the backend at `index`.
    ///
    /// Callers must pass an index below [`len`](Self::len).
    pub(crate) fn selected(&self, index: usize) -> SelectedBackend {
        SelectedBackend {
            index,
            address: self.addresses[index].clone(),
        }
    }
}

/// A backend chosen by a strategy.
///
/// Carries the registry index alongside the address so that connection
/// accounting hits the exact entry that was chosen, even when the registry
/// lists the same address more than once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectedBackend {
    index: usize,
    address: BackendAddress,
}

impl SelectedBackend {
    /// Position of the backend in the registry.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Address to dial.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
