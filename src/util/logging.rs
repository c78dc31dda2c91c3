//! Tracing subscriber setup.

use crate::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `level` when it is set. Calling this again after a
/// subscriber is installed leaves the first one in place.
pub fn init_logging(level: &str, format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let base = fmt::layer().with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(base.json().flatten_event(true).with_current_span(false))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(base.pretty().with_target(false))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
