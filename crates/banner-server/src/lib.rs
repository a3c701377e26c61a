pub mod cache;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use banner_storage::DynStorage;

pub use cache::{CacheBackend, CachedEntry, Outcome, OutcomeCache};
pub use config::{
    AppConfig, AuthConfig, CacheConfig, LoggingConfig, PostgresStorageConfig, RedisConfig,
    ServerConfig, StorageBackend, StorageConfig,
};
pub use middleware::{AuthState, Claims, Principal};
pub use logging::init_tracing;
pub use resolver::{Audience, Resolver};
pub use server::{AppState, BannerServer, ServerBuilder, build_app};
pub use service::{BannerService, ServiceError};

/// Create the storage backend named in the configuration.
///
/// # Errors
///
/// Fails if the PostgreSQL pool cannot be created or migrations fail.
pub async fn create_storage(config: &StorageConfig) -> anyhow::Result<DynStorage> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(banner_db_memory::create_storage())
        }
        StorageBackend::Postgres => {
            let pg = config.postgres.to_backend_config();
            tracing::info!(pool_size = pg.pool_size, "Connecting to PostgreSQL");
            let storage = banner_db_postgres::create_storage(pg).await?;
            Ok(Arc::new(storage))
        }
    }
}

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns local-only cache (DashMap)
/// - **Redis enabled**: Attempts to connect to Redis, falls back to local on failure
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    redis_config.pool = Some(deadpool_redis::PoolConfig {
        max_size: config.pool_size,
        timeouts: deadpool_redis::Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        },
        ..Default::default()
    });

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            CacheBackend::new_local()
        }
    }
}
