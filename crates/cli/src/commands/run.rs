//! `run` command implementation.

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::{info, warn};

use hub::Hub;
use traffic_log::PluginRegistry;

use crate::cli::HubArgs;
use crate::error::CliError;
use crate::settings::build_config;
use crate::status::TerminalReporter;

/// Execute the `run` command
pub async fn run_hub(args: &HubArgs, color: bool) -> Result<()> {
    let config = build_config(args).context("Invalid hub configuration")?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    // Plugins resolve once here; the sink is fixed for the life of the hub
    let registry = PluginRegistry::with_builtins();
    let sink = traffic_log::create_sink(&config.logging, &registry)
        .context("Failed to open traffic log")?;

    let mut hub = Hub::from_config(&config, sink, Handle::current())
        .context("Failed to start endpoints")?;
    if config.status.enabled {
        hub.set_reporter(Box::new(TerminalReporter::new(config.status.format, color)));
    }

    for addr in hub.listener_addrs() {
        info!(addr = %addr, "Accepting connections");
    }

    let shutdown = hub.shutdown_handle();
    let mut runner = tokio::task::spawn_blocking(move || hub.run());

    info!("Hub started, press Ctrl+C to stop");

    let joined = tokio::select! {
        joined = &mut runner => joined,
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, stopping hub...");
            shutdown.trigger();
            runner.await
        }
    };

    let report = joined
        .map_err(|e| CliError::hub_execution(e.to_string()))?
        .context("Hub stopped with an error")?;

    println!("\n{report}");
    info!("sockethub finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
