//! AEROFREN API
//!
//! Entry point for the AEROFREN customer API service.
//!
//! # Startup Sequence
//!
//! 1. Initialize tracing
//! 2. Load configuration
//! 3. Initialize the Prometheus metrics recorder
//! 4. Connect to PostgreSQL and run migrations (when configured)
//! 5. Build the token verifier (when an identity authority is configured)
//! 6. Spawn the rate-limit sweeper
//! 7. Serve until SIGINT/SIGTERM, then drain

use aerofren_api::auth::verifier_from_config;
use aerofren_api::config::Config;
use aerofren_api::observability::metrics::init_metrics_recorder;
use aerofren_api::rate_limit::RateLimiter;
use aerofren_api::repositories::{DocumentStore, PgDocumentStore};
use aerofren_api::routes::{self, AppState};
use aerofren_api::tasks::start_rate_limit_sweeper;
use common::secret::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerofren_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting AEROFREN API");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        store_configured = config.database_url.is_some(),
        auth_configured = config.auth_jwks_url.is_some(),
        admin_allow_list = config.admin_emails.len(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool
    let store: Option<Arc<dyn DocumentStore>> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .idle_timeout(Duration::from_secs(600))
                .connect(database_url.expose_secret())
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;

            sqlx::migrate!("../../migrations")
                .run(&db_pool)
                .await
                .map_err(|e| {
                    error!("Failed to run migrations: {}", e);
                    e
                })?;

            info!("Database connection established");
            Some(Arc::new(PgDocumentStore::new(db_pool)))
        }
        None => {
            warn!("DATABASE_URL not set, store-backed routes will be unavailable");
            None
        }
    };

    let verifier = verifier_from_config(&config);
    let limiter = Arc::new(RateLimiter::new());

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();
    let sweep_interval = config.sweep_interval;
    let drain_period = config.drain_period;

    let shutdown_token = CancellationToken::new();
    let sweeper = tokio::spawn(start_rate_limit_sweeper(
        Arc::clone(&limiter),
        sweep_interval,
        shutdown_token.child_token(),
    ));

    // Create application state
    let state = Arc::new(AppState::new(config, store, verifier, limiter));

    // Build application routes
    let app = routes::build_routes(state, metrics_handle);

    // Parse bind address
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("AEROFREN API listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    shutdown_token.cancel();
    if let Err(e) = sweeper.await {
        error!("Rate limit sweeper failed: {}", e);
    }

    info!("AEROFREN API shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
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

    if drain_period.is_zero() {
        info!("Skipping drain period (API_DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
