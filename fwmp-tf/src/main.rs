//! Task Fulfillment (fwmp-tf) - Main entry point
//!
//! Runs the reference-slot media fulfillment engine behind a REST + SSE
//! surface for the field-worker UI, consuming the FWMP backend for task
//! reads, media storage, and lifecycle mutations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fwmp_common::events::EventBus;
use fwmp_tf::api;
use fwmp_tf::catalog::CatalogManager;
use fwmp_tf::clients::http::BackendClient;
use fwmp_tf::config::Config;
use fwmp_tf::task::SessionManager;

/// Command-line arguments for fwmp-tf
#[derive(Parser, Debug)]
#[command(name = "fwmp-tf")]
#[command(about = "Task Fulfillment service for FWMP")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "FWMP_TF_PORT")]
    port: Option<u16>,

    /// Base URL of the FWMP backend
    #[arg(short, long, env = "FWMP_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token for backend requests
    #[arg(long, env = "FWMP_API_TOKEN")]
    api_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fwmp_tf=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::resolve(
        args.port,
        args.backend_url.as_deref(),
        args.api_token.as_deref(),
    )
    .context("Failed to resolve configuration")?;

    info!("Starting FWMP Task Fulfillment on port {}", config.port);
    info!("Backend: {}", config.backend_url);

    let backend = Arc::new(
        BackendClient::new(config.backend_url.clone(), config.api_token.clone())
            .context("Failed to build backend client")?,
    );

    let events = EventBus::new(1000);
    let sessions = Arc::new(SessionManager::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        events.clone(),
    ));
    let catalogs = Arc::new(CatalogManager::new(
        backend.clone(),
        backend.clone(),
        events.clone(),
    ));

    let app_state = api::AppState {
        sessions,
        catalogs,
        events,
        port: config.port,
    };

    let app = api::create_router(app_state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
