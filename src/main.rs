//! omnicache server - HTTP front end over a configurable cache backend
//!
//! The backend and its settings come from `CACHE_*` environment variables;
//! the listening port from `SERVER_PORT`.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omnicache::api::{create_router, AppState};
use omnicache::{CacheConfig, Registry, ServerConfig};

/// # Startup Sequence
/// 1. Initialize tracing (`RUST_LOG` overrides the default filter)
/// 2. Load server and cache configuration from the environment
/// 3. Build the configured provider and facade
/// 4. Serve HTTP until Ctrl+C or SIGTERM
/// 5. Close the facade
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omnicache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting omnicache server");

    let server = ServerConfig::from_env();
    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    info!(
        provider = %config.provider,
        namespace = %config.namespace,
        default_ttl = ?config.default_ttl,
        port = server.port,
        "Configuration loaded"
    );

    let cache = Registry::with_defaults()
        .new_cache(&config)
        .await
        .with_context(|| format!("failed to start {} provider", config.provider))?;

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(e) = cache.close().await {
        warn!("Failed to close cache: {}", e);
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
