use aerobook_api::{app, AppState};
use aerobook_core::{InMemoryStore, LocalLockProvider, LockProvider};
use aerobook_store::app_config::{Config, LockBackend, StorageBackend};
use aerobook_store::{postgres_repositories, DbClient, RedisClient, RedisLockProvider};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aerobook_api=debug,aerobook_core=debug,aerobook_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting Aerobook API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.ping().await.context("Failed to reach Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            postgres_repositories(&db)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(InMemoryStore::new()).repositories()
        }
    };

    let locks: Arc<dyn LockProvider> = match config.lock.backend {
        LockBackend::Redis => {
            let redis = RedisClient::new(&config.redis.url)
                .await
                .context("Failed to create Redis client")?;
            redis.ping().await.context("Failed to reach Redis")?;
            Arc::new(RedisLockProvider::new(
                redis,
                config.booking.lock_ttl(),
                config.booking.lock_retry_interval(),
            ))
        }
        LockBackend::Local => {
            warn!("Using process-local locks; do not run more than one instance");
            Arc::new(LocalLockProvider::new())
        }
    };

    let state = AppState::new(
        repos,
        locks,
        config.booking.settings(),
        config.booking.retry_policy(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
