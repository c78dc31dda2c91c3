//! Metrics collector using prometheus-client.
//!
//! Tracks forwarding sessions per backend: how many were opened, how many are
//! live, how long they lasted, how many bytes they moved, and how often a
//! backend could not be dialed.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// Labels for per-backend metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabels {
    pub backend: String,
}

/// Labels for bytes transferred metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BytesLabels {
    pub backend: String,
    pub direction: Direction,
}

/// Direction of bytes transfer.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Direction {
    ToBackend,
    ToClient,
}

/// Collects and stores all metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsCollectorInner>,
}

struct MetricsCollectorInner {
    /// Total forwarding sessions opened.
    connections_total: Family<BackendLabels, Counter>,
    /// Forwarding sessions currently open.
    active_connections: Family<BackendLabels, Gauge>,
    /// Session duration histogram (in seconds).
    session_duration_seconds: Family<BackendLabels, Histogram>,
    /// Bytes relayed.
    bytes_total: Family<BytesLabels, Counter>,
    /// Failed dials.
    dial_failures_total: Family<BackendLabels, Counter>,
    /// Connections dropped because no backend could be selected.
    selection_failures_total: Counter,
    /// The prometheus registry.
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let connections_total = Family::<BackendLabels, Counter>::default();
        let active_connections = Family::<BackendLabels, Gauge>::default();
        let session_duration_seconds =
            Family::<BackendLabels, Histogram>::new_with_constructor(|| {
                // Buckets: 10ms up to roughly 1.5h
                Histogram::new(exponential_buckets(0.01, 4.0, 12))
            });
        let bytes_total = Family::<BytesLabels, Counter>::default();
        let dial_failures_total = Family::<BackendLabels, Counter>::default();
        let selection_failures_total = Counter::default();

        registry.register(
            "tcplb_connections",
            "Total number of forwarding sessions opened",
            connections_total.clone(),
        );
        registry.register(
            "tcplb_active_connections",
            "Number of forwarding sessions currently open",
            active_connections.clone(),
        );
        registry.register(
            "tcplb_session_duration_seconds",
            "Forwarding session duration in seconds",
            session_duration_seconds.clone(),
        );
        registry.register(
            "tcplb_bytes",
            "Total bytes relayed",
            bytes_total.clone(),
        );
        registry.register(
            "tcplb_dial_failures",
            "Total number of failed backend dials",
            dial_failures_total.clone(),
        );
        registry.register(
            "tcplb_selection_failures",
            "Total number of connections dropped with no backend to select",
            selection_failures_total.clone(),
        );

        Self {
            inner: Arc::new(MetricsCollectorInner {
                connections_total,
                active_connections,
                session_duration_seconds,
                bytes_total,
                dial_failures_total,
                selection_failures_total,
                registry,
            }),
        }
    }

    /// Get the prometheus registry for encoding.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Record that a forwarding session opened.
    pub fn session_opened(&self, backend: &str) {
        let labels = backend_labels(backend);
        self.inner.connections_total.get_or_create(&labels).inc();
        self.inner.active_connections.get_or_create(&labels).inc();
    }

    /// Record that a forwarding session closed.
    pub fn session_closed(
        &self,
        backend: &str,
        bytes_to_backend: u64,
        bytes_to_client: u64,
        duration: Duration,
    ) {
        let labels = backend_labels(backend);
        self.inner.active_connections.get_or_create(&labels).dec();
        self.inner
            .session_duration_seconds
            .get_or_create(&labels)
            .observe(duration.as_secs_f64());

        self.inner
            .bytes_total
            .get_or_create(&BytesLabels {
                backend: backend.to_string(),
                direction: Direction::ToBackend,
            })
            .inc_by(bytes_to_backend);
        self.inner
            .bytes_total
            .get_or_create(&BytesLabels {
                backend: backend.to_string(),
                direction: Direction::ToClient,
            })
            .inc_by(bytes_to_client);
    }

    /// Record a failed dial.
    pub fn dial_failed(&self, backend: &str) {
        self.inner
            .dial_failures_total
            .get_or_create(&backend_labels(backend))
            .inc();
    }

    /// Record a connection dropped before any backend was selected.
    pub fn selection_failed(&self) {
        self.inner.selection_failures_total.inc();
    }

    /// Number of open sessions recorded for `backend`.
    pub fn active_connections(&self, backend: &str) -> i64 {
        self.inner
            .active_connections
            .get_or_create(&backend_labels(backend))
            .get()
    }
}

fn backend_labels(backend: &str) -> BackendLabels {
    BackendLabels {
        backend: backend.to_string(),
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
