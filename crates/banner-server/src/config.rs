use banner_db_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.auth.secret.is_empty() {
            return Err("auth.secret must not be empty".into());
        }
        if self.cache.banner_ttl_secs == 0 {
            return Err("cache.banner_ttl_secs must be > 0".into());
        }
        if self.redis.enabled && (self.redis.pool_size == 0 || self.redis.timeout_ms == 0) {
            return Err("redis.pool_size and redis.timeout_ms must be > 0".into());
        }
        if self.storage.backend == StorageBackend::Postgres {
            let pg = &self.storage.postgres;
            if pg.url.is_none() && pg.host.is_empty() {
                return Err("storage.postgres requires either 'url' or 'host' to be set".into());
            }
            if pg.url.is_none() && pg.database.is_empty() {
                return Err("storage.postgres.database must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
            if pg.connect_timeout_ms == 0 {
                return Err("storage.postgres.connect_timeout_ms must be > 0".into());
            }
            if pg.min_connections.is_some_and(|min| min > pg.pool_size) {
                return Err("storage.postgres.min_connections must not exceed pool_size".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn banner_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.banner_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}
fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresStorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    /// Full connection URL. Takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_postgres_host")]
    pub host: String,

    #[serde(default = "default_postgres_port")]
    pub port: u16,

    #[serde(default = "default_postgres_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_postgres_database")]
    pub database: String,

    #[serde(default = "default_postgres_pool_size")]
    pub pool_size: u32,

    /// Idle connections kept open. Unset means a quarter of `pool_size`.
    #[serde(default)]
    pub min_connections: Option<u32>,

    #[serde(default = "default_postgres_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_postgres_idle_timeout")]
    pub idle_timeout_ms: Option<u64>,

    /// Pooled connections are recycled after this many seconds. Unset means 30 minutes.
    #[serde(default)]
    pub max_lifetime_secs: Option<u64>,

    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_postgres_host() -> String {
    "localhost".into()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_user() -> String {
    "postgres".into()
}
fn default_postgres_database() -> String {
    "banners".into()
}
fn default_postgres_pool_size() -> u32 {
    10
}
fn default_postgres_connect_timeout() -> u64 {
    5000
}
fn default_postgres_idle_timeout() -> Option<u64> {
    Some(300_000)
}
fn default_run_migrations() -> bool {
    true
}

impl PostgresStorageConfig {
    pub fn connection_url(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }

        let password_part = self
            .password
            .as_ref()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();

        format!(
            "postgres://{}{}@{}:{}/{}",
            self.user, password_part, self.host, self.port, self.database
        )
    }

    /// Converts into the backend's own pool configuration.
    pub fn to_backend_config(&self) -> PostgresConfig {
        PostgresConfig::new(self.connection_url())
            .with_pool_size(self.pool_size)
            .with_min_connections(self.min_connections)
            .with_connect_timeout_ms(self.connect_timeout_ms)
            .with_idle_timeout_ms(self.idle_timeout_ms)
            .with_max_lifetime_secs(self.max_lifetime_secs)
            .with_run_migrations(self.run_migrations)
    }
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_postgres_host(),
            port: default_postgres_port(),
            user: default_postgres_user(),
            password: None,
            database: default_postgres_database(),
            pool_size: default_postgres_pool_size(),
            min_connections: None,
            connect_timeout_ms: default_postgres_connect_timeout(),
            idle_timeout_ms: default_postgres_idle_timeout(),
            max_lifetime_secs: None,
            run_migrations: default_run_migrations(),
        }
    }
}

/// Redis configuration. Without it the outcome cache stays process-local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_redis_pool_size() -> usize {
    10
}
fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached lookup outcome, counted from the write.
    #[serde(default = "default_banner_ttl_secs")]
    pub banner_ttl_secs: u64,
}

fn default_banner_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            banner_ttl_secs: default_banner_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// HMAC key used to verify access tokens.
    #[serde(default)]
    pub secret: String,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const ENV_PREFIX: &str = "BANNERD";
    pub const DEFAULT_CONFIG_PATH: &str = "banner.toml";

    /// Loads the file at `path` (or `banner.toml`) if it exists, then applies
    /// `BANNERD__SECTION__KEY` environment overrides and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. BANNERD__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
