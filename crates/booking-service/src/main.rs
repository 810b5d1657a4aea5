//! Booking Service
//!
//! Entry point: loads configuration, connects to PostgreSQL, runs
//! migrations and serves the HTTP API.

use axum::{routing::get, Router};
use booking_service::config::Config;
use booking_service::observability::metrics::init_metrics_recorder;
use booking_service::repositories::{PgAccountDirectory, PgContentStore, PgSlotStore};
use booking_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Booking Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        meeting_url_base = %config.meeting_url_base,
        enforce_owner_availability = config.enforce_owner_availability,
        "Configuration loaded successfully"
    );

    if !config.room_id_key_configured {
        warn!("ROOM_ID_SECRET is unset; meetings retried after a restart get a new room URL");
    }

    if let Some(metrics_address) = config.metrics_bind_address.clone() {
        let handle = init_metrics_recorder().map_err(|e| {
            error!("Failed to initialize metrics: {}", e);
            e
        })?;
        let addr: SocketAddr = metrics_address.parse().map_err(|e| {
            error!("Invalid metrics bind address: {}", e);
            e
        })?;
        tokio::spawn(serve_metrics(addr, handle));
    }

    // Initialize database connection pool with statement timeout
    info!("Connecting to database...");
    let db_url_with_timeout =
        add_query_timeout(&config.database_url, config.db_statement_timeout_seconds);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;

    info!("Database migrations applied");

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.shutdown_drain_seconds;

    let state = Arc::new(AppState::new(
        config,
        Arc::new(PgAccountDirectory::new(db_pool.clone())),
        Arc::new(PgContentStore::new(db_pool.clone())),
        Arc::new(PgSlotStore::new(db_pool.clone())),
    ));

    let app = routes::build_routes(state);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Booking Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_seconds))
        .await?;

    db_pool.close().await;
    info!("Booking Service shutdown complete");

    Ok(())
}

/// Serve the Prometheus scrape endpoint on its own listener.
async fn serve_metrics(addr: SocketAddr, handle: PrometheusHandle) {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind metrics listener on {}: {}", addr, e);
            return;
        }
    };

    info!("Metrics listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server failed: {}", e);
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (SHUTDOWN_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
