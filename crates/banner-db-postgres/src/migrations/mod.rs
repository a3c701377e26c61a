//! Database migration management for the PostgreSQL storage backend.
//!
//! Migrations are embedded in the binary at compile time and applied
//! programmatically at startup. Applied versions are tracked in
//! `_sqlx_migrations`.
//!
//! To add a migration, create the SQL file under `migrations/` and append an
//! entry to `embedded_migrations!()`.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// (version, description, sql) in chronological order.
macro_rules! embedded_migrations {
    () => {
        &[(
            20240101000001i64,
            "banners",
            include_str!("../../migrations/20240101000001_banners.sql"),
        )]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| {
            Migration::new(
                *version,
                Cow::Borrowed(*description),
                MigrationType::Simple,
                Cow::Borrowed(*sql),
                false,
            )
        })
        .collect()
}

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(e.to_string()))?;

    info!("Database migrations completed");

    Ok(())
}
