mod config;
mod metrics;
mod models;
mod natureremo;
mod scheduler;
mod utils;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use config::ExporterConfig;
use metrics::MetricState;
use natureremo::NatureRemoClient;
use scheduler::RefreshScheduler;

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ExporterConfig::new() {
        Ok(config) => config,
        Err(config::ConfigError::Args(e)) => e.exit(),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Using Nature Remo API at {}", config.api_url);
    let client = NatureRemoClient::new(&config.api_url, &config.token)?;
    let state = MetricState::new()?;
    let registry = state.registry();

    // Shared by the refresh loop and the HTTP server
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutting down");
            cancel.cancel();
        }
    });

    let scheduler = RefreshScheduler::new(client, state, config.interval, config.error_policy());
    let refresh = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = scheduler.run(cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    });

    let served = metrics::serve(config.listen_addr(), registry, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = served {
        error!("Metrics server failed on {}: {}", config.listen_addr(), e);
        return Err(e.into());
    }

    match refresh.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Metrics refresh stopped: {}", e);
            return Err(e.into());
        }
        Err(e) => warn!("Metrics refresh task ended abnormally: {}", e),
    }

    info!("Exporter stopped");
    Ok(())
}
