//! WebLogic Server Controller
//!
//! Watches `WeblogicServer` resources and keeps a NodePort Service and a
//! StatefulSet running for each one, reporting StatefulSet readiness back on
//! the server's status.

mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod reconciler;
mod resources;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use cluster_client::KubeClusterClient;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting WebLogic Server Controller");

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    match config.resync_period {
        Some(period) => info!("  Resync period: {:?}", period),
        None => info!("  Resync period: disabled"),
    }
    info!("  Status update attempts: {}", config.status_update_max_retries);
    info!("  Image: {}", config.image);

    let client = KubeClusterClient::try_default().await?;

    let controller = Controller::new(client, &config);
    controller.run(shutdown_signal()).await?;

    Ok(())
}

/// Resolves on ctrl-c or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
