//! Room Registry
//!
//! Entry point for the Room Registry service. Tracks ephemeral conferencing
//! rooms and issues media credentials for them.

use common::secret::ExposeSecret;
use rr_service::config::Config;
use rr_service::observability::metrics::init_metrics_recorder;
use rr_service::repositories::{InMemoryRoomStore, PgRoomStore, RoomStore};
use rr_service::routes::{self, AppState};
use rr_service::services::{CredentialIssuer, LifecycleCoordinator};
use rr_service::tasks::start_stale_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; LOG_FORMAT=json selects structured output
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "rr_service=debug,tower_http=debug".into()),
    );
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Room Registry");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        persistent = config.database_url.is_some(),
        credentials_configured = config.signing_key.is_some(),
        credential_clock_skew_seconds = config.credential_clock_skew_seconds,
        sweep_interval_seconds = config.sweep_interval_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    // Select the room store
    let store: Arc<dyn RoomStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_url_with_timeout = add_query_timeout(database_url.expose_secret(), 5);
            let db_pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .min_connections(2)
                .acquire_timeout(Duration::from_secs(5))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect(&db_url_with_timeout)
                .await
                .map_err(|e| {
                    error!("Failed to connect to database: {}", e);
                    e
                })?;

            let pg_store = PgRoomStore::new(db_pool);
            pg_store.migrate().await.map_err(|e| {
                error!("Failed to run migrations: {}", e);
                e
            })?;

            info!("Database connection established");
            Arc::new(pg_store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory room store");
            Arc::new(InMemoryRoomStore::new())
        }
    };

    let issuer = CredentialIssuer::from_config(&config).map_err(|e| {
        error!("Failed to initialize credential issuer: {}", e);
        e
    })?;
    if !issuer.is_configured() {
        warn!("No signing key configured, credential issuance is disabled");
    }

    let coordinator =
        LifecycleCoordinator::new(store.clone(), issuer, config.default_global_ref.clone());

    // Start the background sweeper
    let cancel_token = CancellationToken::new();
    let sweeper_handle = if config.sweep_interval_seconds > 0 {
        Some(tokio::spawn(start_stale_sweeper(
            store,
            Duration::from_secs(config.sweep_interval_seconds),
            cancel_token.clone(),
        )))
    } else {
        info!("Background sweeper disabled (RR_SWEEP_INTERVAL_SECONDS=0)");
        None
    };

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    // Create application state
    let state = Arc::new(AppState { coordinator });

    // Build application routes
    let app = routes::build_routes(state, Some(metrics_handle));

    // Parse bind address
    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Registry listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_seconds))
    .await?;

    cancel_token.cancel();
    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!("Stale sweeper task ended abnormally: {}", e);
        }
    }

    info!("Room Registry shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
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
        info!("Skipping drain period (RR_DRAIN_SECONDS=0)");
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
