//! tcplb - A TCP load balancer with pluggable backend selection strategies
//!
//! Usage:
//!     tcplb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use tcplb::backend::build_strategy;
use tcplb::config::{Config, load_config};
use tcplb::frontend::FrontendListener;
use tcplb::metrics::{MetricsCollector, MetricsServer};
use tcplb::proxy::Forwarder;
use tcplb::util::{ShutdownSignal, init_logging};

/// A TCP load balancer with pluggable backend selection strategies.
#[derive(Parser, Debug)]
#[command(name = "tcplb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, value_name = "FILE", default_value = "data/config.yaml")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the port of the listen address
    #[arg(short, long, env = "PORT", value_name = "PORT")]
    port: Option<u16>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    if let Some(port) = cli.port {
        config.listen.set_port(port);
    }

    // Determine log level (CLI overrides config)
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);

    init_logging(log_level, &config.global.log_format);

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!("  Strategy: {}", config.strategy);
        for (idx, server) in config.servers.iter().enumerate() {
            match config.weights.as_ref().and_then(|w| w.get(idx)) {
                Some(weight) => println!("    - {} (weight {})", server, weight),
                None => println!("    - {}", server),
            }
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        listen = %config.listen,
        strategy = %config.strategy,
        servers = config.servers.len(),
        "tcplb starting"
    );

    run(config)
}

/// Run the load balancer with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the load balancer.
async fn run_async(config: Config) -> Result<()> {
    let shutdown = ShutdownSignal::new();
    let metrics = MetricsCollector::new();

    let strategy = build_strategy(config.strategy, config.registry(), config.weights.as_deref())
        .context("failed to build strategy")?;

    let forwarder = Forwarder::new(strategy, metrics.clone(), &config.tcp);

    let listener = FrontendListener::bind(config.listen, forwarder)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;

    let metrics_handle = if config.global.metrics.enabled {
        let server = MetricsServer::bind(
            config.global.metrics.address,
            config.global.metrics.path.clone(),
            metrics,
        )
        .await
        .with_context(|| {
            format!(
                "failed to bind metrics server on {}",
                config.global.metrics.address
            )
        })?;
        Some(tokio::spawn(server.run(shutdown.subscribe())))
    } else {
        None
    };

    info!("tcplb is running");
    info!("press Ctrl+C to stop");

    let listener_result = tokio::select! {
        result = listener.run(shutdown.subscribe()) => result,
        _ = shutdown.shutdown_on_signal() => Ok(()),
    };

    // Stop the metrics server whichever way the listener ended
    shutdown.shutdown();
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    if let Err(e) = listener_result {
        error!(error = %e, "tcplb stopped on listener failure");
        return Err(e).context("listener failed");
    }

    info!("tcplb shut down complete");
    Ok(())
}
