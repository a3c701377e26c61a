//! Connection pool management for the PostgreSQL storage backend.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

pub type PgPoolOptions = PoolOptions<Postgres>;

/// Connection lifetime used when none is configured.
const MAX_LIFETIME_SECS: u64 = 30 * 60;

/// Creates a new PostgreSQL connection pool from the given configuration.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be greater than 0"));
    }

    info!(
        pool_size = config.pool_size,
        connect_timeout_ms = config.connect_timeout_ms,
        "Creating PostgreSQL connection pool"
    );

    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size);

    let max_lifetime = config.max_lifetime_secs.unwrap_or(MAX_LIFETIME_SECS);

    let mut options = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(Duration::from_secs(max_lifetime));

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }

    let pool = options.connect(&config.url).await?;

    debug!("PostgreSQL connection pool created");

    Ok(pool)
}

/// Round-trips a trivial query to check the pool can reach the database.
#[instrument(skip(pool))]
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx_core::query::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Masks the password in a database URL for logging.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
