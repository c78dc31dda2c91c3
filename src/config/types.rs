//! Configuration data types.

use crate::backend::{BackendRegistry, StrategyKind};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Address and port to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Backend selection strategy
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Upstream servers in `host:port` form, in selection order
    #[serde(default)]
    pub servers: Vec<String>,

    /// One weight per server, for the weighted strategies
    #[serde(default)]
    pub weights: Option<Vec<f64>>,

    /// TCP session settings
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Config {
    /// Build the backend registry from the configured servers.
    pub fn registry(&self) -> BackendRegistry {
        BackendRegistry::new(self.servers.iter().cloned())
    }
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
            metrics: MetricsConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether metrics endpoint is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind metrics server
    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,

    /// Path for metrics endpoint
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
            path: default_metrics_path(),
        }
    }
}

/// TCP session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TcpConfig {
    /// Timeout for dialing a backend
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Upper bound on a whole forwarding session; unlimited when absent
    #[serde(default, with = "option_humantime_serde")]
    pub session_timeout: Option<Duration>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            session_timeout: None,
        }
    }
}

// Default value functions
fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3030))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_true() -> bool {
    true
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Custom serde module for optional humantime durations.
mod option_humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let s = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&s)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
