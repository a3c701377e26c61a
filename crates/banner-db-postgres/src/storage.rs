//! PostgreSQL implementation of the `BannerStorage` trait.

use async_trait::async_trait;
use banner_core::{Banner, BannerFilter, BannerId, BannerKey, BannerPatch, NewBanner};
use banner_storage::{BannerStorage, StorageError};
use sqlx_postgres::PgPool;

use crate::config::PostgresConfig;
use crate::error::PostgresError;
use crate::queries::banners;
use crate::{migrations, pool};

/// PostgreSQL storage backend for banners.
///
/// Uniqueness of `(feature_id, tag_id)` is enforced by the
/// `banner_references_feature_tag_key` constraint; concurrent writers racing
/// for a pair are resolved by the database, not by application locks.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a pool and runs the embedded migrations when configured to.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, PostgresError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BannerStorage for PostgresStorage {
    async fn create(&self, banner: &NewBanner) -> Result<BannerId, StorageError> {
        let id = banners::create(&self.pool, banner).await?;
        tracing::debug!(
            banner_id = id,
            feature_id = banner.feature_id,
            "banner created"
        );
        Ok(id)
    }

    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
        banners::list(&self.pool, filter).await
    }

    async fn get(&self, key: BannerKey) -> Result<Option<Banner>, StorageError> {
        banners::get(&self.pool, key).await
    }

    async fn partial_update(&self, id: BannerId, patch: &BannerPatch) -> Result<(), StorageError> {
        banners::partial_update(&self.pool, id, patch).await
    }

    async fn delete(&self, id: BannerId) -> Result<(), StorageError> {
        banners::delete(&self.pool, id).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        pool::ping(&self.pool).await.map_err(Into::into)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
