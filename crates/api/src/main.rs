use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use ridepool_api::services::payments::HttpPaymentGateway;
use ridepool_api::{app, config, jobs, middleware};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting RidePool API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let db_config = persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    };
    let pool = persistence::db::create_pool(&db_config).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations completed");

    // Payment provider client shared by handlers and jobs
    let gateway = Arc::new(HttpPaymentGateway::new(&config.payments)?);

    // Background jobs
    let mut scheduler = jobs::JobScheduler::new();
    scheduler.register(jobs::ExpireSeatLocksJob::new(
        pool.clone(),
        config.pool.seat_lock_sweep_secs,
    ));
    scheduler.register(jobs::PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    // Build application
    let addr = config.socket_addr()?;
    let app = app::create_app(config, pool, gateway);

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop jobs once the server has drained
    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    // SIGINT is enough for local runs; orchestrators send SIGTERM
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
