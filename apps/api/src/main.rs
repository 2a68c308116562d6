//! API server entry point.

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use meridian_api::invalidation::{InvalidationSink, NoopInvalidator, RedisInvalidator};
use meridian_api::{create_app, ApiConfig, AppState};
use meridian_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meridian API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        tax_rate_bps = config.tax_rate_bps,
        "Configuration loaded"
    );

    // Connect to the database (runs migrations)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await?;
    info!("Database ready");

    // Cache invalidation sink: Redis when configured, otherwise a no-op
    let invalidator: Arc<dyn InvalidationSink> = match &config.redis_url {
        Some(url) => match RedisInvalidator::new(url) {
            Ok(sink) => {
                info!("Connected to Redis for cache invalidation");
                Arc::new(sink)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, continuing without invalidation");
                Arc::new(NoopInvalidator)
            }
        },
        None => {
            info!("No REDIS_URL configured, cache invalidation disabled");
            Arc::new(NoopInvalidator)
        }
    };

    // Build the application
    let state = AppState::new(db, invalidator, config.tax_rate());
    let app = create_app(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.http_port);
    info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
