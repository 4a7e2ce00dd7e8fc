//! CLI module for gate-server.
//!
//! This module provides the command-line interface that can be used either
//! as a standalone binary or as the `serve` subcommand of the quota-gate CLI.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gate_config::{CliOverrides, EnvInputs, LoggingConfig, resolve_config};
use gate_core::SystemClock;
use gate_store::{ConnectOptions, connect};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::channels::{Channel, MemoryChannelDirectory};
use crate::state::AppState;
use crate::{CancellationToken, run_with_shutdown};

/// gate-server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gate-server",
    version,
    about = "Admission control for multi-tenant API gateways"
)]
pub struct ServeArgs {
    /// Config file path (json/yaml/toml). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Run the admission server with the given arguments.
///
/// This is the main entry point for the server CLI, used by both the
/// standalone binary and the unified quota-gate CLI.
pub async fn run(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args.config.as_deref(), &EnvInputs::from_env(), &args.overrides)?;

    init_tracing(&config.logging);

    if let Some(listen) = &config.metrics.listen {
        match gate_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    let store = connect(
        config.store.url.as_deref(),
        config.store.token.as_deref(),
        ConnectOptions {
            timeout: Duration::from_millis(config.store.timeout_ms),
            connect_timeout: Duration::from_secs(config.store.connect_timeout_secs),
            scan_count: config.store.scan_count,
        },
    )
    .await;

    let channels = Arc::new(MemoryChannelDirectory::from_config(&config.channels));
    info!(channels = channels.len(), "channel directory loaded");
    let state = AppState::with_directory(&config, store, SystemClock::shared(), channels.clone())?;

    // Set up graceful shutdown on SIGTERM/SIGINT
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    // Set up SIGHUP handler for channel reload
    #[cfg(unix)]
    {
        let config_path = args.config.clone();
        let overrides = args.overrides.clone();
        let channels = channels.clone();
        tokio::spawn(async move {
            reload_signal_handler(config_path, overrides, channels).await;
        });
    }

    run_with_shutdown(&config, state, shutdown).await?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            // Fall back to waiting forever
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                // Fall back to waiting forever
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Handle SIGHUP for channel reload (Unix only).
#[cfg(unix)]
async fn reload_signal_handler(
    config_path: Option<PathBuf>,
    overrides: CliOverrides,
    channels: Arc<MemoryChannelDirectory>,
) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!(
                "failed to install SIGHUP handler: {}, channel reload disabled",
                e
            );
            return;
        }
    };

    loop {
        sighup.recv().await;
        info!("SIGHUP received, reloading channels");

        match reload_channels(config_path.as_deref(), &overrides, &channels) {
            Ok(count) => info!(channels = count, "channels reloaded"),
            Err(e) => warn!("failed to reload configuration: {}", e),
        }
    }
}

/// Reload the channel table from the config file.
///
/// Store, identity and quota settings require a restart. Settings changed
/// through the admin API since the last load are discarded.
#[cfg(unix)]
fn reload_channels(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
    channels: &MemoryChannelDirectory,
) -> Result<usize, gate_config::ConfigError> {
    let config = resolve_config(config_path, &EnvInputs::from_env(), overrides)?;
    channels.replace_all(config.channels.iter().map(Channel::from_config));
    Ok(config.channels.len())
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error)
/// - `format`: Output format (json, pretty, compact). Default: pretty
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
pub fn init_tracing(config: &LoggingConfig) {
    let base_level = config
        .level
        .as_deref()
        .unwrap_or(gate_core::DEFAULT_LOG_LEVEL);
    let mut filter_str = base_level.to_string();

    for (module, level) in &config.filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }

    let filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let result = match (format, output) {
        ("json", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stdout))
            .try_init(),
        ("json", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        ("compact", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stdout))
            .try_init(),
        ("compact", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        (_, "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stdout))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
    };
    if result.is_err() {
        warn!("tracing subscriber already installed");
    }
}
