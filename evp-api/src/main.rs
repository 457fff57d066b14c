//! Evaluation Process service (evp-api) - Main entry point

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use evp_common::config::Config;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evp_api::{build_router, db, AppState};

/// Command-line arguments for evp-api
#[derive(Parser, Debug)]
#[command(name = "evp-api")]
#[command(about = "Contractor evaluation-process HTTP service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "EVP_PORT")]
    port: Option<u16>,

    /// sqlx database URL (overrides config file)
    #[arg(short, long, env = "EVP_DATABASE_URL")]
    database_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, env = "EVP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evp_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!("Starting EVP API on port {}", config.port);
    info!("Database: {}", config.database_url);

    // Connect and initialize schema
    let pool = db::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::init::init_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;
    info!("Database schema initialized");

    let verifier = config
        .build_verifier()
        .context("Failed to configure token verification")?;
    if verifier.is_disabled() {
        info!("Token verification disabled (all requests run as local admin)");
    }

    let state = AppState::new(pool, verifier, config.form_base_url.clone());
    let app = build_router(state);

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
