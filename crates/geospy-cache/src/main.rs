//! GeoSpy Cache - in-process cache service for the geolocation pipeline

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};
use geospy_api::{AppState, create_router};
use geospy_core::CacheManager;

/// GeoSpy Cache - cache administration service for geocoding and map results
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "GEOSPY_CACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "GEOSPY_CACHE_PORT")]
    port: Option<u16>,
}

/// Run the cache administration server
///
/// Pre-registers the configured caches, starts the expiry sweeper and serves
/// health, stats, clear, cleanup and metrics routes until Ctrl+C. Nothing in
/// this binary writes entries: collaborators that link `geospy-core` obtain
/// the same named caches from the manager and fill them through `get`/`set`
/// or `get_or_try_insert_with`.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting GeoSpy Cache v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    // Cached payloads are JSON documents from the geocoding and map services.
    // The geo clients that fill these caches run in the web application; this
    // process only hosts the registry, its sweeper and the admin API over it.
    let caches = Arc::new(CacheManager::new());
    let registered = config
        .cache
        .register_all::<serde_json::Value>(&caches)
        .context("Failed to register caches")?;
    info!("Registered {} caches", registered);

    caches
        .start_cleanup_thread(config.cache.cleanup_interval())
        .context("Failed to start cache cleanup thread")?;

    let app = create_router(AppState::new(caches.clone()), metrics_handle)
        .layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    caches.stop_cleanup_thread();

    info!("Server stopped");
    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the configured level
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
