//! blanknotes API Server
//!
//! Usage:
//!   blanknotes-api [--config <file>] [--host <host>] [--port <port>]
//!
//! Without `--config`, everything comes from the environment. A
//! `DATABASE_URL` of `memory://` runs on the in-memory store.

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use blanknotes_api::{create_router, state::AppState};
use blanknotes_core::config::{AppConfig, LoggingConfig, ServerConfig};
use blanknotes_core::{MemoryStore, PgStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blanknotes-api")]
#[command(about = "Notes REST API with cookie-based JWT sessions")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables still take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "blanknotes_api={level},blanknotes_core={level},tower_http={level},audit=info",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(server: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let origins = server
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cors = cors_layer(&config.server)?;
    let timeout = Duration::from_secs(config.server.request_timeout_secs);

    // Create application state
    let state = if config.database.is_memory() {
        warn!("Using in-memory storage; data is lost on restart");
        AppState::new(config, Arc::new(MemoryStore::new()))
    } else {
        let store = PgStore::new(&config.database.url, config.database.pool_size)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store.migrate().await.context("Failed to apply schema")?;
        AppState::new(config, Arc::new(store))
    };

    let app = create_router(Arc::new(state))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("blanknotes API starting on http://{}", addr);
    info!("Swagger UI available at http://{}/api/v1/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
