//! Stockpile HTTP server.
//!
//! Connects to `PostgreSQL` and Redis, applies schema migrations and serves
//! the inventory, orders and ledger APIs.

use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use stockpile_redis::RedisCache;
use stockpile_web::{build_router, AppState, Config};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockpile=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stockpile HTTP server");

    let config = Config::from_env();
    info!(
        database_url = %config.postgres.url,
        redis_url = %config.redis.url,
        bind_addr = %config.server.bind_addr,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    info!("Database connected");

    stockpile_postgres::migrate(&pool).await?;

    let cache = RedisCache::new(&config.redis.url).await?;
    info!("Redis connected");

    let state = AppState::new(pool, cache);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "Listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // Shut down cleanly on Ctrl-C; in-flight requests finish first.
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
