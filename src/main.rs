use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenantry::config::Config;
use tenantry::identity::{AuthEvents, GoTrueService};
use tenantry::AppState;

#[derive(Parser, Debug)]
#[command(name = "tenantry")]
#[command(author, version, about = "Property rental management web application", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tenantry.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the identity service URL
    #[arg(long, env = "TENANTRY_IDENTITY_URL")]
    identity_url: Option<String>,

    /// Override the identity service public key
    #[arg(long, env = "TENANTRY_IDENTITY_ANON_KEY", hide_env_values = true)]
    identity_anon_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.identity_url {
        config.identity.url = url;
    }
    if let Some(key) = cli.identity_anon_key {
        config.identity.anon_key = key;
    }

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tenantry v{}", env!("CARGO_PKG_VERSION"));

    if config.identity.anon_key.is_empty() {
        tracing::warn!("No identity service key configured; requests will be rejected upstream");
    }

    let events = AuthEvents::new();
    let identity = Arc::new(GoTrueService::new(&config.identity, events.clone()));
    let state = Arc::new(AppState::new(config.clone(), identity, events));

    state.auth_listener.ensure_started();

    let app = tenantry::api::create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        environment = ?config.server.environment,
        "Server listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.auth_listener.shutdown();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
