mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warrior_core::{
    load_config, validate_config, CoordinatorIdentity, HttpCoordinator, PipelineDriver,
    ProcessSupervisor, WgetDownloader,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("WARRIOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config)?;

    info!(
        version = VERSION,
        project = %config.project.name,
        downloader = %config.project.downloader,
        "Configuration loaded successfully"
    );

    // Locate a usable downloader before claiming anything
    let supervisor = ProcessSupervisor::new(config.supervisor.clone());
    let wget = WgetDownloader::discover(config.downloader.clone(), &supervisor)
        .await
        .context("No usable Wget+Lua found")?;

    let identity = CoordinatorIdentity::new(&config.project.downloader, &config.project.version);
    let coordinator = Arc::new(
        HttpCoordinator::new(config.coordinator.clone(), identity)
            .context("Failed to create coordinator client")?,
    );

    let driver = PipelineDriver::from_config(&config, coordinator, wget);
    let state = Arc::new(AppState::new(config.clone(), driver.monitor(), driver.gates()));
    info!("Coordinator at {}", state.sanitized_config().coordinator.url);

    // Status server stays up until the pipeline has drained
    let (server_stop_tx, server_stop_rx) = oneshot::channel::<()>();
    let server = if config.status.enabled {
        let addr = SocketAddr::new(config.status.host, config.status.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Status server listening on {}", addr);

        let app = create_router(Arc::clone(&state));
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_stop_rx.await;
                })
                .await
        }))
    } else {
        info!("Status server disabled");
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing in-flight items");
        let _ = shutdown_tx.send(true);
    });

    let summary = driver.run(shutdown_rx).await;
    info!(
        claimed = summary.claimed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Pipeline stopped"
    );

    let _ = server_stop_tx.send(());
    if let Some(handle) = server {
        handle
            .await
            .context("Status server task panicked")?
            .context("Server error")?;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
