//! Configuration validation.

use crate::config::Config;

/// Validate the configuration.
///
/// Checks for:
/// - At least one server
/// - Server addresses in `host:port` form
/// - Weights that are non-negative, finite, and not all zero
/// - Weights present and one per server for weighted strategies
/// - A non-zero connect timeout
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    // Check for at least one server
    if config.servers.is_empty() {
        errors.push("at least one server must be defined".to_string());
    }

    // Check server address shape; resolution happens at dial time
    for server in &config.servers {
        match server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => errors.push(format!(
                "server '{}' is not in host:port form",
                server
            )),
        }
    }

    // Check weights
    if let Some(ref weights) = config.weights {
        for weight in weights {
            if !weight.is_finite() || *weight < 0.0 {
                errors.push(format!(
                    "weight {} must be a non-negative number",
                    weight
                ));
            }
        }

        if !weights.is_empty() && weights.iter().all(|w| *w == 0.0) {
            errors.push("weights must not all be zero".to_string());
        }
    }

    if config.strategy.is_weighted() {
        let count = config.weights.as_ref().map_or(0, Vec::len);
        if count != config.servers.len() {
            errors.push(format!(
                "strategy '{}' needs one weight per server ({} servers, {} weights)",
                config.strategy,
                config.servers.len(),
                count
            ));
        }
    }

    if config.tcp.connect_timeout.is_zero() {
        errors.push("tcp.connect_timeout must be greater than zero".to_string());
    }

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StrategyKind;
    use crate::config::*;
    use std::time::Duration;

    fn minimal_config() -> Config {
        Config {
            global: GlobalConfig::default(),
            listen: "127.0.0.1:8080".parse().unwrap(),
            strategy: StrategyKind::RoundRobin,
            servers: vec!["127.0.0.1:9000".to_string()],
            weights: None,
            tcp: TcpConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_hostname_server_is_valid() {
        let mut config = minimal_config();
        config.servers.push("backend.internal:8080".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_no_servers() {
        let mut config = minimal_config();
        config.servers.clear();
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("at least one server"));
    }

    #[test]
    fn test_server_without_port() {
        let mut config = minimal_config();
        config.servers.push("localhost".to_string());
        config.servers.push("localhost:http".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("'localhost' is not in host:port form"));
        assert!(err.contains("'localhost:http' is not in host:port form"));
    }

    #[test]
    fn test_weighted_strategy_needs_weights() {
        let mut config = minimal_config();
        config.strategy = StrategyKind::WeightedLeastConnections;
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("needs one weight per server"));

        config.weights = Some(vec![1.0]);
        assert!(validate_config(&config).is_ok());

        config.weights = Some(vec![1.0, 2.0]);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_negative_weight() {
        let mut config = minimal_config();
        config.strategy = StrategyKind::WeightedRoundRobin;
        config.weights = Some(vec![-1.0]);
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("non-negative"));
    }

    #[test]
    fn test_all_zero_weights() {
        let mut config = minimal_config();
        config.strategy = StrategyKind::WeightedRoundRobin;
        config.weights = Some(vec![0.0]);
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("all be zero"));
    }

    #[test]
    fn test_zero_connect_timeout() {
        let mut config = minimal_config();
        config.tcp.connect_timeout = Duration::ZERO;
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("connect_timeout"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = minimal_config();
        config.global.log_level = "loud".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("invalid log level"));
    }
}
