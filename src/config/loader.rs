//! Configuration file loading.

use crate::config::{Config, validate_config};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a YAML file.
///
/// JSON files load as well, JSON being a subset of YAML.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// The parsed and validated configuration, or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;

    let config: Config = serde_yaml::from_str(&contents)?;

    validate_config(&config).map_err(ConfigError::ValidationError)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StrategyKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(
            r#"
servers:
  - "127.0.0.1:9000"
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.strategy, StrategyKind::RoundRobin);
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
global:
  log_level: debug
  log_format: pretty
  metrics:
    enabled: false
listen: "127.0.0.1:4000"
strategy: weighted-round-robin
servers:
  - "127.0.0.1:9001"
  - "127.0.0.1:9002"
weights: [0.5, 1.5]
tcp:
  connect_timeout: 2s
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listen.port(), 4000);
        assert_eq!(config.strategy, StrategyKind::WeightedRoundRobin);
        assert_eq!(config.weights, Some(vec![0.5, 1.5]));
        assert!(!config.global.metrics.enabled);
    }

    #[test]
    fn test_load_json_config() {
        let file = write_config(
            r#"{"servers": ["127.0.0.1:9001"], "strategy": "least-connections"}"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.strategy, StrategyKind::LeastConnections);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.yaml");
        assert!(matches!(result.unwrap_err(), ConfigError::ReadError(_)));
    }

    #[test]
    fn test_load_unknown_strategy() {
        let file = write_config(
            r#"
strategy: fastest
servers: ["127.0.0.1:9000"]
"#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().contains("unknown strategy kind 'fastest'"));
    }

    #[test]
    fn test_load_weight_mismatch() {
        let file = write_config(
            r#"
strategy: weighted-least-connections
servers: ["127.0.0.1:9000", "127.0.0.1:9001"]
weights: [1]
"#,
        );

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let file = write_config("not: valid: yaml: {{{}}}");

        let result = load_config(file.path());
        assert!(result.is_err());
    }
}
