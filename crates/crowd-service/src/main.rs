use anyhow::{Context, Result};
use crowd_service::{api, config::CrowdServiceConfig, CrowdServiceState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = telemetry::init_with_service("crowd-service");

    info!("Starting Crowd Service...");

    let config = CrowdServiceConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        estimated_capacity = config.monitor.estimated_capacity,
        max_zones = config.monitor.max_zones,
        max_venues = config.max_venues,
        "Crowd Service configuration loaded"
    );

    let state = CrowdServiceState::with_max_venues(config.monitor.clone(), config.max_venues);
    let app = api::router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Crowd Service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Crowd Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
