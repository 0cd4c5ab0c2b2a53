use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectern::config::Config;
use lectern::db::{create_pool, init_db, queries, AppState};
use lectern::handlers;
use lectern::payments::PaystackClient;

#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(about = "Paid enrollment and payment reconciliation for courses and e-books")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Periodically purge the webhook event log. Payment state itself is never purged.
fn spawn_cleanup_task(state: AppState, retention_days: i64) {
    if retention_days <= 0 {
        tracing::info!("Webhook event retention disabled; log kept forever");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));

        loop {
            interval.tick().await;

            match state.db.get() {
                Ok(conn) => match queries::purge_old_webhook_events(&conn, retention_days) {
                    Ok(count) if count > 0 => {
                        tracing::info!(
                            "Purged {} webhook events older than {} days",
                            count,
                            retention_days
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Failed to purge webhook events: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                }
            }
        }
    });

    tracing::info!("Background cleanup task started (runs hourly)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectern=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(PaystackClient::new(&config.paystack)),
        base_url: config.base_url.clone(),
        default_currency: config.default_currency.clone(),
        dashboard_url: config.dashboard_url.clone(),
        library_url: config.library_url.clone(),
    };

    spawn_cleanup_task(state.clone(), config.webhook_event_retention_days);

    let app = Router::new()
        .merge(handlers::router(Some(config.rate_limit)))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set LECTERN_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Lectern listening on {} (callbacks via {})", addr, config.base_url);

    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
